//! Progress notifications
//!
//! Sequential "label + completion fraction" events for whatever layer is
//! presenting the run. Reporting never blocks the pipeline.

use crate::models::{ProgressEvent, StageName};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Build an event, clamping the fraction into range
pub fn event(label: impl Into<String>, stage: Option<StageName>, fraction: f32) -> ProgressEvent {
    ProgressEvent {
        label: label.into(),
        stage,
        fraction: fraction.clamp(0.0, 1.0),
    }
}

/// Discards every event
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes events to the log
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        info!(
            progress = %format!("{:.0}%", event.fraction * 100.0),
            stage = event.stage.map(|s| s.as_str()),
            "{}",
            event.label
        );
    }
}

/// Keeps every event in memory, in order
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Forwards events over a channel; a closed receiver is ignored
impl ProgressReporter for UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}
