//! Run Monitoring Module
//!
//! Turns the engine's event stream into timing reports.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/end timing for Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent, TimelineSpan};
