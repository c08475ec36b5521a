use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_http_requests_total", "Total HTTP requests",
        &["method", "path", "status", "family"]
    ).unwrap();
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "switchyard_http_request_duration_seconds", "Admin API request latency",
        &["method", "path"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();
    pub static ref CLUSTER_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "switchyard_cluster_operation_duration_seconds", "Cluster operation latency",
        &["cluster", "operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
    pub static ref CLUSTER_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_cluster_errors_total", "Cluster operation errors", &["cluster", "operation"]
    ).unwrap();
    pub static ref TRANSPORT_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_transport_retries_total", "Requests retried after a transport failure",
        &["cluster"]
    ).unwrap();
    pub static ref DISPENSABLE_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_dispensable_failures_total", "Failures absorbed on dispensable clusters",
        &["cluster", "operation"]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "switchyard_search_duration_seconds", "Search latency", &["index"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
    pub static ref LIFECYCLE_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_lifecycle_transitions_total", "Index lifecycle transitions",
        &["alias", "transition"]
    ).unwrap();
    pub static ref DOCUMENTS_WRITTEN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "switchyard_documents_written_total", "Documents written", &["alias", "target"]
    ).unwrap();
    pub static ref IMPORTS_IN_PROGRESS: IntGauge = register_int_gauge!(
        "switchyard_imports_in_progress", "Imports currently streaming into a generation"
    ).unwrap();
}

/// RAII guard that decrements an IntGauge on drop.
pub struct GaugeGuard<'a>(pub &'a IntGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

pub fn init() {
    lazy_static::initialize(&HTTP_REQUESTS_TOTAL);
    lazy_static::initialize(&HTTP_REQUEST_DURATION);
    lazy_static::initialize(&CLUSTER_OPERATION_DURATION);
    lazy_static::initialize(&CLUSTER_ERRORS_TOTAL);
    lazy_static::initialize(&TRANSPORT_RETRIES_TOTAL);
    lazy_static::initialize(&DISPENSABLE_FAILURES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
    lazy_static::initialize(&LIFECYCLE_TRANSITIONS_TOTAL);
    lazy_static::initialize(&DOCUMENTS_WRITTEN_TOTAL);
    lazy_static::initialize(&IMPORTS_IN_PROGRESS);
}
