use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Histogram, HistogramVec, IntCounter, IntCounterVec,
};

lazy_static::lazy_static! {
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "napp_queries_total", "Total queries", &["kind"]
    ).unwrap();
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "napp_query_duration_seconds", "Query duration", &["algorithm"],
        vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
    pub static ref POSTINGS_SCANNED_TOTAL: IntCounter = register_int_counter!(
        "napp_postings_scanned_total", "Posting entries consumed by queries"
    ).unwrap();
    pub static ref CANDIDATES_TOTAL: IntCounter = register_int_counter!(
        "napp_candidates_total", "Candidates passed to re-ranking"
    ).unwrap();
    pub static ref DISTANCE_COMPUTATIONS_TOTAL: IntCounter = register_int_counter!(
        "napp_distance_computations_total", "Exact distance evaluations during re-ranking"
    ).unwrap();
    pub static ref POSTING_FLUSHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "napp_posting_flushes_total", "Temporary posting list flushes", &["locking"]
    ).unwrap();
    pub static ref BUILD_DURATION: Histogram = register_histogram!(
        "napp_build_duration_seconds", "Index build duration",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&QUERIES_TOTAL);
    lazy_static::initialize(&QUERY_DURATION);
    lazy_static::initialize(&POSTINGS_SCANNED_TOTAL);
    lazy_static::initialize(&CANDIDATES_TOTAL);
    lazy_static::initialize(&DISTANCE_COMPUTATIONS_TOTAL);
    lazy_static::initialize(&POSTING_FLUSHES_TOTAL);
    lazy_static::initialize(&BUILD_DURATION);
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_text() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
