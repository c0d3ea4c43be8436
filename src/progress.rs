//! Progress reporting.
//!
//! The collector calls these at fixed milestones; frontends (GUI, CLI, logs)
//! implement the trait to surface status. One sink is built by the entry point
//! and passed down explicitly. Methods take `&self` because concurrent fetch
//! units report through the same reference.

use std::fmt::Display;
use std::sync::Mutex;
use tracing::{error, info};

pub trait ProgressSink: Send + Sync {
    /// Headline status for human eyes.
    fn set_status(&self, _text: &str) {}

    /// Overall progress, 0-100.
    fn set_progress(&self, _percent: f64) {}

    /// Progress within the current step, 0-100.
    fn set_sub_progress(&self, _percent: f64) {}

    /// Secondary detail line (e.g. the team being fetched).
    fn set_detail(&self, _text: &str) {}
}

/// Log a fatal failure and leave it as the sink's final status.
pub fn report_failure(sink: &dyn ProgressSink, context: &str, err: &dyn Display) {
    error!("{}: {}", context, err);
    sink.set_status(&format!("Error: {}", err));
}

/// A no-op progress sink.
pub struct NullProgress;
impl ProgressSink for NullProgress {}

/// Renders progress as log lines.
#[derive(Default)]
pub struct LogProgress {
    last_logged: Mutex<Option<u8>>,
}

impl ProgressSink for LogProgress {
    fn set_status(&self, text: &str) {
        info!("[status] {}", text);
    }

    fn set_progress(&self, percent: f64) {
        // Only log whole-percent changes
        let whole = percent.clamp(0.0, 100.0) as u8;
        let mut last = self.last_logged.lock().unwrap_or_else(|e| e.into_inner());
        if *last != Some(whole) {
            *last = Some(whole);
            info!("[progress] {}%", whole);
        }
    }

    fn set_detail(&self, text: &str) {
        info!("[detail] {}", text);
    }
}

/// One recorded progress call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Status(String),
    Progress(f64),
    SubProgress(f64),
    Detail(String),
}

/// Keeps every event; handy for embedders that render later, and for tests.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn set_status(&self, text: &str) {
        self.push(ProgressEvent::Status(text.to_string()));
    }

    fn set_progress(&self, percent: f64) {
        self.push(ProgressEvent::Progress(percent));
    }

    fn set_sub_progress(&self, percent: f64) {
        self.push(ProgressEvent::SubProgress(percent));
    }

    fn set_detail(&self, text: &str) {
        self.push(ProgressEvent::Detail(text.to_string()));
    }
}
