use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "status_transformer_runs_total",
            "Total number of function runs by outcome."
        ),
        &["outcome"]
    )
    .unwrap();
    pub static ref MODEL_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "status_transformer_model_calls_total",
            "Total number of model service calls by result."
        ),
        &["result"]
    )
    .unwrap();
    pub static ref MALFORMED_SUBMISSIONS_TOTAL: IntCounter = IntCounter::new(
        "status_transformer_malformed_submissions_total",
        "Total number of status submissions that failed to decode."
    )
    .unwrap();
}

/// Register all collectors with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(MODEL_CALLS_TOTAL.clone()),
        Box::new(MALFORMED_SUBMISSIONS_TOTAL.clone()),
    ];
    for collector in collectors {
        // AlreadyReg is expected on repeated calls, e.g. one router per test.
        let _ = REGISTRY.register(collector);
    }
}

pub fn record_run(outcome: &str) {
    RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_model_call(result: &str) {
    MODEL_CALLS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_malformed_submission() {
    MALFORMED_SUBMISSIONS_TOTAL.inc();
}

/// Gather metrics for exposition in the text format.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(format!("metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_register() {
        register_metrics();
        register_metrics();
        record_run("success");
        record_malformed_submission();

        let text = gather_metrics().unwrap();
        assert!(text.contains("status_transformer_runs_total{outcome=\"success\"}"));
        assert!(text.contains("status_transformer_malformed_submissions_total"));
    }
}
