//! Configuration synthesis subsystem.
//!
//! # Data Flow
//! ```text
//! SynthesisEngine::generate(event)
//!     → lock server tree
//!     → SnapshotProvider::list_services()
//!     → definition.rs (parse serverId:locationId:matchPattern:backendTarget)
//!     → probe.rs (TCP reachability)       unreachable → retry.rs
//!     → tree.rs (ServerNode.locations rebuilt)
//!     → template renderer
//!     → persist.rs (temp file + rename)
//!     → reload.rs (external command)
//! ```

pub mod definition;
pub mod engine;
pub mod persist;
pub mod probe;
pub mod reload;
pub mod retry;
pub mod tree;

pub use definition::{DefinitionError, ServiceDefinition};
pub use engine::{EngineError, EngineParts, PassError, PassReport, SynthesisEngine};
pub use persist::{persist_atomic, PersistError};
pub use probe::{ProbeError, ReachabilityProbe, TcpProbe};
pub use reload::{CommandReloader, ReloadError, Reloader};
pub use retry::{RetryScheduler, RetryTicks};
pub use tree::{LocationNode, ServerNode};
