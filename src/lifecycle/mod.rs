//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect orchestrator → Load server templates → Initial pass
//!     → Start retry worker, event bus, change listener, template watcher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop dispatcher → Stop background tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Unblock the event bus wait
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then orchestrator, then engine, then listeners
//! - The initial pass runs before any event can be dispatched

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, run_once, Collaborators, StartupError};
