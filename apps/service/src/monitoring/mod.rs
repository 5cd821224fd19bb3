/// Check monitoring engine
///
/// This module is responsible for:
/// - Validating check records read from the store
/// - Probing HTTP/HTTPS endpoints within each check's timeout
/// - Classifying outcomes, persisting state and alerting on transitions
/// - Running cycles over every stored check
pub mod checker;
pub mod outcome;
pub mod scheduler;
pub mod types;
pub mod validation;


pub use checker::{HttpProber, Prober};
pub use outcome::OutcomeProcessor;
pub use scheduler::MonitoringScheduler;
pub use types::{CheckDisposition, CycleReport, ProbeOutcome};
