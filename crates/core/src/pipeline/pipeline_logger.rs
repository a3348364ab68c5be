use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::capture::configuration_abort::ConfigurationAbort;
use crate::shared::constants::PROGRESS_LOG_INTERVAL;

/// Cross-cutting logger for capture pipeline events.
///
/// Decouples the session from specific output mechanisms so each caller can
/// observe frame flow without changing the capture code. Events arrive from
/// the sample-buffer queue (frames) and the session queue (aborts).
pub trait PipelineLogger: Send {
    /// A buffer was converted and handed to the dispatcher.
    fn frame_converted(&mut self, sequence: u64);

    /// A buffer could not be converted and was dropped.
    fn frame_dropped(&mut self, sequence: u64);

    /// Milliseconds one stage spent on one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Session configuration stopped short.
    fn aborted(&mut self, abort: &ConfigurationAbort);

    /// Lifecycle message meant for the session owner.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger shared between the session's execution contexts.
pub type SharedPipelineLogger = Arc<Mutex<dyn PipelineLogger>>;

pub fn shared(logger: impl PipelineLogger + 'static) -> SharedPipelineLogger {
    Arc::new(Mutex::new(logger))
}

/// Locks a shared logger, ignoring poisoning; a panicked event handler
/// leaves counters that are still worth reporting.
pub fn lock_logger(logger: &SharedPipelineLogger) -> MutexGuard<'_, dyn PipelineLogger + 'static> {
    logger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Used when the session owner does not ask for events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_converted(&mut self, _sequence: u64) {}
    fn frame_dropped(&mut self, _sequence: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn aborted(&mut self, _abort: &ConfigurationAbort) {}
    fn info(&mut self, _message: &str) {}
}

/// Running totals for one pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTiming {
    pub count: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageTiming {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    pub fn average_ms(&self) -> f64 {
        self.total_ms / self.count.max(1) as f64
    }
}

/// Counts converted and dropped frames, tracks per-stage timing and
/// reports a summary when the session finishes.
///
/// Progress is logged every `throttle_frames` converted frames.
pub struct StatsPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, StageTiming>,
    start_time: Instant,
    converted: usize,
    dropped: usize,
    last_sequence: Option<u64>,
    abort: Option<ConfigurationAbort>,
    messages: Vec<String>,
}

impl StatsPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            start_time: Instant::now(),
            converted: 0,
            dropped: 0,
            last_sequence: None,
            abort: None,
            messages: Vec::new(),
        }
    }

    pub fn converted(&self) -> usize {
        self.converted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn abort(&self) -> Option<&ConfigurationAbort> {
        self.abort.as_ref()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn timings_for(&self, stage: &str) -> Option<StageTiming> {
        self.timings.get(stage).copied()
    }

    /// Returns the formatted summary string, or `None` if nothing happened.
    pub fn summary_string(&self) -> Option<String> {
        if self.converted == 0 && self.dropped == 0 && self.abort.is_none() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = Vec::new();
        lines.push(format!(
            "Capture summary ({} converted, {} dropped, {:.1}s total):",
            self.converted,
            self.dropped,
            elapsed_ms / 1000.0
        ));

        if let Some(sequence) = self.last_sequence {
            lines.push(format!("  last frame: #{sequence}"));
        }
        if let Some(abort) = &self.abort {
            lines.push(format!("  aborted: {abort} [{}]", abort.code()));
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let timing = &self.timings[stage];
            lines.push(format!(
                "  {stage:12}: avg {:6.2}ms  max {:6.2}ms  total {:7.1}ms",
                timing.average_ms(),
                timing.max_ms,
                timing.total_ms
            ));
        }

        if self.converted > 0 && elapsed_ms > 0.0 {
            let fps = self.converted as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new(PROGRESS_LOG_INTERVAL)
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn frame_converted(&mut self, sequence: u64) {
        self.converted += 1;
        self.last_sequence = Some(sequence);
        if self.converted % self.throttle_frames == 0 {
            log::info!(
                "Captured {} frame(s), {} dropped (last #{sequence})",
                self.converted,
                self.dropped
            );
        }
    }

    fn frame_dropped(&mut self, sequence: u64) {
        self.dropped += 1;
        self.last_sequence = Some(sequence);
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn aborted(&mut self, abort: &ConfigurationAbort) {
        self.abort = Some(abort.clone());
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
