use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Pipeline stages with their own timing counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Interview,
    Needs,
    Hypergraph,
    Extract,
    Upload,
    Query,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Analyze,
        Stage::Interview,
        Stage::Needs,
        Stage::Hypergraph,
        Stage::Extract,
        Stage::Upload,
        Stage::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Interview => "interview",
            Stage::Needs => "needs",
            Stage::Hypergraph => "hypergraph",
            Stage::Extract => "extract",
            Stage::Upload => "upload",
            Stage::Query => "query",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Default)]
struct StageTimer {
    runs: AtomicUsize,
    total_us: AtomicU64,
}

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    stages: [StageTimer; 7],

    // Counts
    files_processed: AtomicUsize,
    nodes_built: AtomicUsize,
    edges_built: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            stages: Default::default(),
            files_processed: AtomicUsize::new(0),
            nodes_built: AtomicUsize::new(0),
            edges_built: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stage(&self, stage: Stage, duration: Duration) {
        let timer = &self.stages[stage.index()];
        timer.runs.fetch_add(1, Ordering::Relaxed);
        timer.total_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_graph(&self, nodes: usize, edges: usize) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.nodes_built.fetch_add(nodes, Ordering::Relaxed);
        self.edges_built.fetch_add(edges, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            stages: Stage::ALL
                .iter()
                .map(|stage| {
                    let timer = &self.stages[stage.index()];
                    let runs = timer.runs.load(Ordering::Relaxed);
                    StageSnapshot {
                        stage: stage.as_str(),
                        runs,
                        avg_time_ms: avg_time_ms(timer.total_us.load(Ordering::Relaxed), runs),
                    }
                })
                .collect(),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            nodes_built: self.nodes_built.load(Ordering::Relaxed),
            edges_built: self.edges_built.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: u64, count: usize) -> f64 {
    if count > 0 {
        total_us as f64 / count as f64 / 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct StageSnapshot {
    pub stage: &'static str,
    pub runs: usize,
    pub avg_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub stages: Vec<StageSnapshot>,
    pub files_processed: usize,
    pub nodes_built: usize,
    pub edges_built: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_per_stage() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_stage(Stage::Needs, Duration::from_millis(10));
        metrics.record_stage(Stage::Needs, Duration::from_millis(30));
        metrics.record_graph(5, 4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);

        let needs = snapshot.stages.iter().find(|s| s.stage == "needs").unwrap();
        assert_eq!(needs.runs, 2);
        assert!((needs.avg_time_ms - 20.0).abs() < 1e-6);

        let upload = snapshot.stages.iter().find(|s| s.stage == "upload").unwrap();
        assert_eq!(upload.avg_time_ms, 0.0);
        assert_eq!(snapshot.nodes_built, 5);
    }
}
