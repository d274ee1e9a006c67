pub mod checker;
pub mod diff;
/// Monitoring engine module - runs the per-domain polling loop
///
/// This module is responsible for:
/// - Probing reachability and fetching registration data
/// - Detecting registration changes between cycles
/// - Deciding when a notification is warranted
/// - Appending every cycle to the domain's log
pub mod engine;
pub mod lookup;
pub mod state;
pub mod types;

pub use checker::HttpProber;
pub use engine::{Collaborators, EngineSettings, MonitoringEngine};
pub use lookup::{Lookup, NetworkLookup, WhoisLookup};
