//! Classification of probe results, state persistence and alert dispatch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::types::{AlertDisposition, ProbeOutcome, ProcessedOutcome};
use crate::database::{CHECKS, RecordStore};
use crate::models::{Check, CheckState};
use crate::notify::Notifier;

/// `up` only when the endpoint answered with one of the check's success codes
pub fn classify(check: &Check, outcome: &ProbeOutcome) -> CheckState {
    match outcome.status_code() {
        Some(code) if check.accepts(code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// A baseline probe never alerts, and neither does an unchanged state
pub fn alert_warranted(previous: &Check, new_state: CheckState) -> bool {
    previous.last_checked.is_some() && previous.state != new_state
}

pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeProcessor {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Record the probe result for the check stored under `key`
    ///
    /// The state write always happens first. The alert is only sent when the
    /// write landed, so a lost write cannot produce an alert that the next
    /// cycle would repeat.
    pub async fn process(&self, key: &str, check: Check, outcome: &ProbeOutcome) -> ProcessedOutcome {
        let new_state = classify(&check, outcome);
        let warranted = alert_warranted(&check, new_state);
        let previous_state = check.state;

        let mut updated = check;
        updated.state = new_state;
        updated.last_checked = Some(Utc::now());

        let persisted = match self.persist(key, &updated).await {
            Ok(()) => true,
            Err(e) => {
                error!(check_id = %updated.id, "Failed to save check state: {e}");
                false
            }
        };

        let alert = match (warranted, persisted) {
            (false, _) => {
                info!(
                    check_id = %updated.id,
                    state = %new_state,
                    %outcome,
                    "Check outcome unchanged, no alert needed"
                );
                AlertDisposition::NotWarranted
            }
            (true, false) => {
                warn!(check_id = %updated.id, "State change not saved, alert withheld");
                AlertDisposition::Withheld
            }
            (true, true) => {
                info!(
                    check_id = %updated.id,
                    from = %previous_state,
                    to = %new_state,
                    %outcome,
                    "Check changed state"
                );
                self.alert(&updated).await
            }
        };

        ProcessedOutcome { state: new_state, persisted, alert }
    }

    async fn persist(&self, key: &str, check: &Check) -> anyhow::Result<()> {
        let record = check.to_record()?;
        self.store.update(CHECKS, key, &record).await?;
        Ok(())
    }

    async fn alert(&self, check: &Check) -> AlertDisposition {
        let message = check.alert_message();

        match self.notifier.send(&check.user_key, &message).await {
            Ok(()) => {
                info!(check_id = %check.id, %message, "User alerted to status change");
                AlertDisposition::Sent
            }
            Err(e) => {
                error!(check_id = %check.id, "Could not alert user to status change: {e}");
                AlertDisposition::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::monitoring::validation::validate_check;
    use crate::test_support::{FlakyStore, RecordingNotifier, USER_KEY, check, check_record};
    use chrono::Duration;

    const ID: &str = "abcdefghij0123456789";

    fn previously(state: CheckState) -> Check {
        let mut check = check(ID, "example.com/health");
        check.state = state;
        check.last_checked = Some(Utc::now() - Duration::minutes(1));
        check
    }

    async fn seeded_store(store: &dyn RecordStore) {
        store.create(CHECKS, ID, &check_record(ID, "example.com/health")).await.unwrap();
    }

    #[test]
    fn test_classification() {
        let mut check = check(ID, "example.com");
        check.success_codes = vec![200, 301];

        assert_eq!(classify(&check, &ProbeOutcome::Response(200)), CheckState::Up);
        assert_eq!(classify(&check, &ProbeOutcome::Response(301)), CheckState::Up);
        assert_eq!(classify(&check, &ProbeOutcome::Response(404)), CheckState::Down);
        assert_eq!(classify(&check, &ProbeOutcome::Timeout), CheckState::Down);
        assert_eq!(
            classify(&check, &ProbeOutcome::Transport("connection refused".into())),
            CheckState::Down
        );
    }

    #[test]
    fn test_alert_rules() {
        let baseline = check(ID, "example.com");
        assert!(!alert_warranted(&baseline, CheckState::Up));
        assert!(!alert_warranted(&baseline, CheckState::Down));

        assert!(alert_warranted(&previously(CheckState::Up), CheckState::Down));
        assert!(alert_warranted(&previously(CheckState::Down), CheckState::Up));
        assert!(!alert_warranted(&previously(CheckState::Down), CheckState::Down));
        assert!(!alert_warranted(&previously(CheckState::Up), CheckState::Up));
    }

    #[tokio::test]
    async fn test_baseline_probe_persists_without_alert() {
        let store = Arc::new(MemoryStore::new());
        seeded_store(store.as_ref()).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = OutcomeProcessor::new(store.clone(), notifier.clone());

        let result = processor.process(ID, check(ID, "example.com/health"), &ProbeOutcome::Response(200)).await;

        assert_eq!(result.state, CheckState::Up);
        assert!(result.persisted);
        assert_eq!(result.alert, AlertDisposition::NotWarranted);
        assert!(notifier.sent().is_empty());

        let saved = validate_check(store.read(CHECKS, ID).await.unwrap()).unwrap();
        assert_eq!(saved.state, CheckState::Up);
        assert!(saved.last_checked.is_some());
    }

    #[tokio::test]
    async fn test_transition_alerts_owner_once() {
        let store = Arc::new(MemoryStore::new());
        seeded_store(store.as_ref()).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = OutcomeProcessor::new(store.clone(), notifier.clone());

        let result = processor.process(ID, previously(CheckState::Up), &ProbeOutcome::Timeout).await;

        assert_eq!(result.state, CheckState::Down);
        assert_eq!(result.alert, AlertDisposition::Sent);
        assert_eq!(
            notifier.sent(),
            vec![(
                USER_KEY.to_string(),
                "Alert: Your check for GET https://example.com/health is currently down".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_write_failure_withholds_alert() {
        let store = Arc::new(FlakyStore::failing_writes());
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = OutcomeProcessor::new(store.clone(), notifier.clone());

        let result = processor.process(ID, previously(CheckState::Down), &ProbeOutcome::Response(200)).await;

        assert_eq!(result.state, CheckState::Up);
        assert!(!result.persisted);
        assert_eq!(result.alert, AlertDisposition::Withheld);
        assert_eq!(store.updates(), 1);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_saved_state() {
        let store = Arc::new(MemoryStore::new());
        seeded_store(store.as_ref()).await;
        let notifier = Arc::new(RecordingNotifier::failing());
        let processor = OutcomeProcessor::new(store.clone(), notifier.clone());

        let result = processor.process(ID, previously(CheckState::Down), &ProbeOutcome::Response(200)).await;

        assert!(result.persisted);
        assert_eq!(result.alert, AlertDisposition::Failed);
        assert_eq!(notifier.sent().len(), 1);

        let saved = validate_check(store.read(CHECKS, ID).await.unwrap()).unwrap();
        assert_eq!(saved.state, CheckState::Up);
    }

    #[tokio::test]
    async fn test_unknown_fields_survive_write_back() {
        let store = Arc::new(MemoryStore::new());
        let mut record = check_record(ID, "example.com/health");
        record["label"] = serde_json::json!("homepage");
        store.create(CHECKS, ID, &record).await.unwrap();
        let processor = OutcomeProcessor::new(store.clone(), Arc::new(RecordingNotifier::new()));

        let check = validate_check(record).unwrap();
        processor.process(ID, check, &ProbeOutcome::Response(500)).await;

        let saved = store.read(CHECKS, ID).await.unwrap();
        assert_eq!(saved["label"], "homepage");
        assert_eq!(saved["state"], "down");
        assert!(saved["lastChecked"].as_i64().unwrap() > 0);
    }
}
