//! Index generation lifecycle behind a stable alias.
//!
//! A family's public alias points at one timestamp-named generation. A
//! rebuild creates a new generation, marks it with `<alias>_importing` so live
//! writes are duplicated into it, imports, swaps the alias, and retires old
//! generations. All state lives in the engine's alias metadata and is derived
//! on demand.

pub mod manager;
pub mod plan;

pub use manager::{IndexLifecycle, ReindexReport};
pub use plan::{
    derive_state, family_generations, importing_alias, is_generation_of, next_generation_name,
    plan_cleanup,
    CleanupReport, FamilyStatus, LifecycleState,
};

use crate::feed::RecordFeed;

/// Records to import as part of a forced rebuild.
pub struct RebuildImport<R> {
    pub doc_type: String,
    pub feed: Box<dyn RecordFeed<R>>,
}

/// Options for `IndexLifecycle::rebuild`.
pub struct RebuildOptions<R> {
    /// Point the alias at the rebuilt generation.
    pub switch: bool,
    pub import: Option<RebuildImport<R>>,
}

impl<R> Default for RebuildOptions<R> {
    fn default() -> Self {
        Self {
            switch: true,
            import: None,
        }
    }
}
