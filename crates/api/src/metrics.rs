use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use query::Stage;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    no_content_answers: AtomicUsize,
    titles_generated: AtomicUsize,

    // Failures per stage
    embed_failures: AtomicUsize,
    search_failures: AtomicUsize,
    generate_failures: AtomicUsize,

    // Timing (in microseconds)
    total_answer_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            no_content_answers: AtomicUsize::new(0),
            titles_generated: AtomicUsize::new(0),
            embed_failures: AtomicUsize::new(0),
            search_failures: AtomicUsize::new(0),
            generate_failures: AtomicUsize::new(0),
            total_answer_time_us: AtomicU64::new(0),
        })
    }

    /// A successful `answer`. `grounded` is false for the no-content reply.
    pub fn record_answer(&self, duration: Duration, grounded: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        if !grounded {
            self.no_content_answers.fetch_add(1, Ordering::Relaxed);
        }
        self.total_answer_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, stage: Stage) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match stage {
            Stage::Embed => &self.embed_failures,
            Stage::Search => &self.search_failures,
            Stage::Generate => &self.generate_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_title(&self) {
        self.titles_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let embed = self.embed_failures.load(Ordering::Relaxed);
        let search = self.search_failures.load(Ordering::Relaxed);
        let generate = self.generate_failures.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: embed + search + generate,
            embed_failures: embed,
            search_failures: search,
            generate_failures: generate,
            no_content_answers: self.no_content_answers.load(Ordering::Relaxed),
            titles_generated: self.titles_generated.load(Ordering::Relaxed),
            avg_answer_time_ms: avg_time_ms(&self.total_answer_time_us, &self.successful_requests),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub embed_failures: usize,
    pub search_failures: usize,
    pub generate_failures: usize,
    pub no_content_answers: usize,
    pub titles_generated: usize,
    pub avg_answer_time_ms: f64,
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
