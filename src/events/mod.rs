//! In-process event subsystem.
//!
//! # Data Flow
//! ```text
//! ChangeListener / TemplateWatcher
//!     → Publisher::publish(Event)
//!     → unbounded queue
//!     → single dispatcher task
//!     → handlers for Event::name, in registration order
//! ```
//!
//! # Design Decisions
//! - Subscriptions are fixed before dispatch starts (builder)
//! - One event is fully dispatched before the next is dequeued
//! - Events without handlers are dropped; the dispatch loop keeps running

pub mod bus;

pub use bus::{EventBus, EventBusBuilder, Publisher};

use std::fmt;

/// Kinds of change notification the synthesizer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    ServiceModified,
    ServiceRemoved,
    TemplateChanged,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ServiceModified => "ServiceModified",
            EventName::ServiceRemoved => "ServiceRemoved",
            EventName::TemplateChanged => "TemplateChanged",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification. The payload is informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: EventName,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(name: EventName, payload: serde_json::Value) -> Self {
        Self { name, payload }
    }
}
