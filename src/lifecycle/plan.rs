use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::types::AliasTable;

/// `chrono` format of the 14-digit generation suffix.
pub const GENERATION_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Generations kept by cleanup: the newest stays open, the one before it is closed.
pub const RETAINED_GENERATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No generation of the family exists.
    Absent,
    /// Generations exist but nothing points the alias at one.
    Created,
    /// The importing alias resolves to a generation.
    Importing,
    /// The alias resolves and at most one older generation is kept.
    Live,
    /// The alias resolves and stale generations await cleanup.
    Retiring,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Absent => write!(f, "absent"),
            LifecycleState::Created => write!(f, "created"),
            LifecycleState::Importing => write!(f, "importing"),
            LifecycleState::Live => write!(f, "live"),
            LifecycleState::Retiring => write!(f, "retiring"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyStatus {
    pub alias: String,
    pub importing_alias: String,
    pub live: Option<String>,
    pub importing: Option<String>,
    pub generations: Vec<String>,
    pub state: LifecycleState,
}

impl FamilyStatus {
    pub fn from_table(alias: &str, table: &AliasTable) -> Self {
        let importing_alias = importing_alias(alias);
        Self {
            alias: alias.to_string(),
            live: table.resolve(alias).map(str::to_string),
            importing: table.resolve(&importing_alias).map(str::to_string),
            importing_alias,
            generations: family_generations(alias, table),
            state: derive_state(alias, table),
        }
    }
}

/// What cleanup did (or would do) to a family's generations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub closed: Option<String>,
    /// Generations cleanup would have touched but an alias still points at.
    pub protected: Vec<String>,
}

pub fn importing_alias(alias: &str) -> String {
    format!("{alias}_importing")
}

/// True if `index` is `<alias>_<14 digits>`.
pub fn is_generation_of(alias: &str, index: &str) -> bool {
    index
        .strip_prefix(alias)
        .and_then(|rest| rest.strip_prefix('_'))
        .map(|ts| ts.len() == 14 && ts.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// The family's generations, oldest first.
pub fn family_generations(alias: &str, table: &AliasTable) -> Vec<String> {
    table
        .generations()
        .into_iter()
        .filter(|g| is_generation_of(alias, g))
        .collect()
}

/// Name for a new generation stamped with `now`.
///
/// If a generation with the same or a later stamp already exists (two creates
/// within one second, or clock skew between hosts), the stamp is moved to one
/// second past the newest existing generation so names stay unique and sort
/// in creation order.
pub fn next_generation_name(alias: &str, existing: &BTreeSet<String>, now: DateTime<Utc>) -> String {
    let candidate = now.format(GENERATION_TIMESTAMP_FORMAT).to_string();
    let latest = existing
        .iter()
        .filter(|g| is_generation_of(alias, g))
        .map(|g| &g[alias.len() + 1..])
        .max();

    let stamp = match latest {
        Some(latest) if latest >= candidate.as_str() => {
            match NaiveDateTime::parse_from_str(latest, GENERATION_TIMESTAMP_FORMAT) {
                Ok(t) => (t + chrono::Duration::seconds(1))
                    .format(GENERATION_TIMESTAMP_FORMAT)
                    .to_string(),
                Err(_) => candidate,
            }
        }
        _ => candidate,
    };
    format!("{alias}_{stamp}")
}

pub fn derive_state(alias: &str, table: &AliasTable) -> LifecycleState {
    let generations = family_generations(alias, table);
    if table.resolve(&importing_alias(alias)).is_some() {
        return LifecycleState::Importing;
    }
    match table.resolve(alias) {
        Some(_) if generations.len() > RETAINED_GENERATIONS => LifecycleState::Retiring,
        Some(_) => LifecycleState::Live,
        None if !generations.is_empty() => LifecycleState::Created,
        None => LifecycleState::Absent,
    }
}

/// Decide which generations to delete and which to close.
///
/// Sorted oldest → newest: everything but the newest two is deleted, and the
/// older of the two survivors is closed. Anything the alias or the importing
/// alias points at is left alone.
pub fn plan_cleanup(alias: &str, table: &AliasTable) -> CleanupReport {
    let generations = family_generations(alias, table);
    let importing = importing_alias(alias);
    let in_use: BTreeSet<&str> = table
        .holders(alias)
        .into_iter()
        .chain(table.holders(&importing))
        .collect();

    let mut report = CleanupReport::default();
    let split = generations.len().saturating_sub(RETAINED_GENERATIONS);
    let (stale, retained) = generations.split_at(split);

    for g in stale {
        if in_use.contains(g.as_str()) {
            report.protected.push(g.clone());
        } else {
            report.deleted.push(g.clone());
        }
    }
    if retained.len() > 1 {
        let older = &retained[0];
        if in_use.contains(older.as_str()) {
            report.protected.push(older.clone());
        } else {
            report.closed = Some(older.clone());
        }
    }
    report
}
