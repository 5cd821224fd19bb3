use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::checker::Prober;
use super::outcome::OutcomeProcessor;
use super::types::{CheckDisposition, CycleReport};
use super::validation::validate_check;
use crate::database::{CHECKS, RecordStore};
use crate::notify::Notifier;

/// Keys of checks currently being worked on by any cycle
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Marks a check as in flight until dropped
struct InFlightGuard {
    in_flight: InFlight,
    key: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, key: &str) -> Option<Self> {
        let inserted =
            in_flight.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string());
        inserted.then(|| Self { in_flight: in_flight.clone(), key: key.to_string() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

/// Runs cycles over every stored check
///
/// Cycles carry no state between them apart from the set of checks that are
/// still in flight; a check still being probed by an earlier cycle is skipped.
#[derive(Clone)]
pub struct MonitoringScheduler {
    store: Arc<dyn RecordStore>,
    prober: Arc<dyn Prober>,
    processor: Arc<OutcomeProcessor>,
    in_flight: InFlight,
}

impl MonitoringScheduler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let processor = Arc::new(OutcomeProcessor::new(store.clone(), notifier));
        Self { store, prober, processor, in_flight: Arc::default() }
    }

    /// Number of checks currently in flight across all cycles
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// List every check and process them concurrently
    ///
    /// Failures are contained to the check they occur in.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);
        self.run_cycle_inner().instrument(span).await
    }

    async fn run_cycle_inner(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let keys = match self.store.list(CHECKS).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Could not list checks: {e}");
                return report;
            }
        };

        report.listed = keys.len();
        if keys.is_empty() {
            info!("No checks to process");
            return report;
        }
        info!(checks = keys.len(), "Starting check cycle");

        let mut tasks = JoinSet::new();
        for key in keys {
            let scheduler = self.clone();
            let span = info_span!("check", check_id = %key);
            tasks.spawn(async move { scheduler.run_check(&key).await }.instrument(span));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(disposition) => report.record(&disposition),
                Err(e) => {
                    error!("Check task did not complete: {e}");
                    report.aborted += 1;
                }
            }
        }

        info!(%report, "Check cycle finished");
        report
    }

    /// Read, validate, probe and record a single check
    pub async fn run_check(&self, key: &str) -> CheckDisposition {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, key) else {
            warn!("Check still in flight from an earlier cycle, skipping");
            return CheckDisposition::SkippedInFlight;
        };

        let raw = match self.store.read(CHECKS, key).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Error reading check data: {e}");
                return CheckDisposition::ReadFailed;
            }
        };

        let check = match validate_check(raw) {
            Ok(check) => check,
            Err(e) => {
                warn!("Check is not properly formatted, skipping it: {e}");
                return CheckDisposition::Invalid;
            }
        };

        let outcome = self.prober.probe(&check).await;
        CheckDisposition::Processed(self.processor.process(key, check, &outcome).await)
    }
}
