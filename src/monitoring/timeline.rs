//! Execution Timeline
//!
//! Builds a per-run timeline from engine events for timing reports and
//! Gantt charts. Entries are keyed by execution order, so a step revisited
//! through a backward jump gets a bar of its own.

use std::time::{Duration, Instant};

use crate::execution::EngineEvent;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
    /// Step was disabled
    Skipped,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Position in execution order, shared by a step's start and end
    pub sequence: usize,
    /// 0-based index of the step in the workflow
    pub step_index: usize,
    pub step_type: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// One executed (or skipped) step, start to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineSpan {
    pub sequence: usize,
    pub step_index: usize,
    pub step_type: String,
    pub status: EventType,
    /// Offset from the timeline start
    pub start: Duration,
    /// `None` while the step is still running
    pub end: Option<Duration>,
}

impl TimelineSpan {
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    fn label(&self) -> String {
        format!("{}:{}", self.step_index + 1, self.step_type)
    }
}

/// Tracks the execution timeline of a workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
    next_sequence: usize,
    open: Option<(usize, usize)>,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
            next_sequence: 0,
            open: None,
        }
    }

    /// Records an engine event. Progress and log events are ignored.
    pub fn record(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::StepStarting { index, step_type } => {
                let sequence = self.allocate();
                self.open = Some((sequence, *index));
                self.add_event(sequence, *index, step_type, EventType::Started);
            }
            EngineEvent::StepCompleted {
                index,
                step_type,
                outcome,
            } => {
                let started = match self.open.take() {
                    Some((sequence, open_index)) if open_index == *index => Some(sequence),
                    _ => None,
                };
                let (sequence, event_type) = match (started, outcome.success) {
                    (Some(sequence), true) => (sequence, EventType::Completed),
                    (Some(sequence), false) => (sequence, EventType::Failed),
                    // Completion without a start: disabled or unresolvable step
                    (None, true) => (self.allocate(), EventType::Skipped),
                    (None, false) => (self.allocate(), EventType::Failed),
                };
                self.add_event(sequence, *index, step_type, event_type);
            }
            EngineEvent::Progress { .. } | EngineEvent::Log { .. } => {}
        }
    }

    /// Records a raw event.
    pub fn add_event(
        &mut self,
        sequence: usize,
        step_index: usize,
        step_type: &str,
        event_type: EventType,
    ) {
        self.events.push(TimelineEvent {
            sequence,
            step_index,
            step_type: step_type.to_string(),
            event_type,
            timestamp: Instant::now(),
        });
        self.next_sequence = self.next_sequence.max(sequence + 1);
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Folds events into spans, in execution order.
    pub fn spans(&self) -> Vec<TimelineSpan> {
        let mut spans: Vec<TimelineSpan> = Vec::new();

        for event in &self.events {
            let offset = event.timestamp.duration_since(self.start_time);
            match spans.iter_mut().find(|s| s.sequence == event.sequence) {
                Some(span) => {
                    span.status = event.event_type;
                    span.end = Some(offset);
                }
                None => spans.push(TimelineSpan {
                    sequence: event.sequence,
                    step_index: event.step_index,
                    step_type: event.step_type.clone(),
                    status: event.event_type,
                    start: offset,
                    end: match event.event_type {
                        EventType::Started => None,
                        _ => Some(offset),
                    },
                }),
            }
        }

        spans.sort_by_key(|s| s.sequence);
        spans
    }

    /// Returns finished span durations in milliseconds, in execution order.
    pub fn get_durations(&self) -> Vec<(usize, u128)> {
        self.spans()
            .iter()
            .filter_map(|span| span.duration().map(|d| (span.step_index, d.as_millis())))
            .collect()
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each executed step is shown as a bar indicating when it ran
    /// relative to the total execution time. Skipped steps get a `-`.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        for span in self.spans() {
            let Some(end) = span.end else {
                continue;
            };
            let start_ms = span.start.as_millis();
            let end_ms = end.as_millis();
            let start_pos = (start_ms as f64 * scale) as usize;

            let (marker, width) = match span.status {
                EventType::Skipped => ("-", 1),
                EventType::Failed => ("!", ((end_ms - start_ms) as f64 * scale).max(1.0) as usize),
                _ => ("#", ((end_ms - start_ms) as f64 * scale).max(1.0) as usize),
            };

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&marker.repeat(width));

            output.push_str(&format!(
                "{:16} |{:50}| ({} ms)\n",
                truncate(&span.label(), 16),
                bar,
                end_ms - start_ms
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    fn allocate(&mut self) -> usize {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
