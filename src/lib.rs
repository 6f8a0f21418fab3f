//! Reverse-proxy configuration synthesizer.
//!
//! Keeps a reverse-proxy configuration file in sync with the services
//! registered in a container orchestrator: every service change triggers a
//! full regeneration of the file followed by a proxy reload.

pub mod config;
pub mod discovery;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod synthesis;
pub mod template;

pub use config::SynthConfig;
pub use events::{Event, EventName};
pub use synthesis::SynthesisEngine;
