use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use std::sync::OnceLock;

// Declare the static OnceLock to hold the Metrics.
static METRICS_INSTANCE: OnceLock<Arc<Metrics>> = OnceLock::new();

/// Initializes on first use and gets a reference to the process-wide `Metrics`.
/// Synchronous so the coordinator's settle path can record without awaiting.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| {
        info!("Initializing Metrics ...");
        Metrics::new()
    })
}

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_HTTP_ERROR: &str = "http_error";
pub const OUTCOME_TRANSPORT_ERROR: &str = "transport_error";
pub const OUTCOME_SESSION_EXPIRED: &str = "session_expired";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_SKIPPED: &str = "skipped";
pub const OUTCOME_MALFORMED: &str = "malformed";
pub const OUTCOME_INTERRUPTED: &str = "interrupted";
pub const OUTCOME_SUPERSEDED: &str = "superseded";

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Dispatcher metrics
    pub requests: IntCounterVec,
    pub request_duration: HistogramVec,
    pub unauthorized: IntCounterVec,
    pub replays: IntCounter,

    // Refresh coordinator metrics
    pub refresh_calls: IntCounterVec,
    pub refresh_duration: Histogram,
    pub queued_requests: IntCounter,
    pub queue_depth: IntGauge,

    // Session
    pub session_terminations: IntCounter,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenrelay".into()), None)
            .unwrap_or_default();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Dispatcher
            requests: IntCounterVec::new(Opts::new("requests_total", "Outbound requests by method and final outcome"), &["method", "outcome"]).unwrap(),
            request_duration: HistogramVec::new(HistogramOpts::new("request_duration_seconds", "Outbound request duration seconds, replay included").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["method"]).unwrap(),
            unauthorized: IntCounterVec::new(Opts::new("unauthorized_responses_total", "401 responses by attempt kind"), &["attempt"]).unwrap(),
            replays: IntCounter::new("replays_total", "Requests re-issued after a refresh").unwrap(),

            // Refresh
            refresh_calls: IntCounterVec::new(Opts::new("refresh_calls_total", "Refresh calls by outcome"), &["outcome"]).unwrap(),
            refresh_duration: Histogram::with_opts(HistogramOpts::new("refresh_duration_seconds", "Refresh call duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])).unwrap(),
            queued_requests: IntCounter::new("queued_requests_total", "Requests parked behind an in-flight refresh").unwrap(),
            queue_depth: IntGauge::new("refresh_queue_depth", "Requests currently waiting for a refresh").unwrap(),

            session_terminations: IntCounter::new("session_terminations_total", "Sessions terminated after an unrecoverable refresh failure").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if relay is serving").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.requests.clone())).unwrap();
        reg.register(Box::new(metrics.request_duration.clone())).unwrap();
        reg.register(Box::new(metrics.unauthorized.clone())).unwrap();
        reg.register(Box::new(metrics.replays.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_calls.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.queued_requests.clone())).unwrap();
        reg.register(Box::new(metrics.queue_depth.clone())).unwrap();
        reg.register(Box::new(metrics.session_terminations.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
