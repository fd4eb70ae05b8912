//! Failure classification for a terminal, failed operation.
//!
//! Three cases matter: the job never reached a worker (deterministic
//! failure, never retried), it ran and died for an unrelated reason
//! (also never retried), or its instance was reclaimed by the provider
//! (the one recoverable case). Preemption is confirmed against the
//! compute zone-operations log rather than inferred from the job error.

use std::time::Duration;

use crate::gcp::types::{Operation, PREEMPTED_OPERATION_TYPE};
use crate::gcp::{ApiError, ZoneOperationsApi};

const TARGET_URL_BASE: &str = "https://www.googleapis.com/compute/v1";

/// Delay before the zone-operations query; the preemption record can lag
/// the job failure.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No worker was ever assigned (bad image, quota, malformed request).
    NeverStarted,
    /// A worker ran the job but no preemption record exists for it.
    Unrelated,
    /// The worker instance was reclaimed by the provider.
    Preempted,
}

pub struct FailureClassifier<'a> {
    compute: &'a dyn ZoneOperationsApi,
    project: &'a str,
    settle_delay: Duration,
}

impl<'a> FailureClassifier<'a> {
    pub fn new(compute: &'a dyn ZoneOperationsApi, project: &'a str) -> Self {
        Self {
            compute,
            project,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Classifies a terminal operation that carries an error.
    pub async fn classify(&self, operation: &Operation) -> Result<Classification, ApiError> {
        let Some(assignment) = operation.last_worker_assignment() else {
            return Ok(Classification::NeverStarted);
        };

        let target = format!(
            "{TARGET_URL_BASE}/projects/{}/zones/{}/instances/{}",
            self.project, assignment.zone, assignment.instance
        );
        let filter =
            format!("(targetLink eq {target}) (operationType eq {PREEMPTED_OPERATION_TYPE})");

        tokio::time::sleep(self.settle_delay).await;

        let items = self
            .compute
            .list_operations(self.project, assignment.zone, &filter)
            .await?;

        let preempted = items
            .iter()
            .any(|op| op.operation_type == PREEMPTED_OPERATION_TYPE);

        if preempted {
            Ok(Classification::Preempted)
        } else {
            Ok(Classification::Unrelated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::types::{
        EventDetails, OperationEvent, OperationMetadata, ZoneOperation, WORKER_ASSIGNED_EVENT,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeCompute {
        items: Vec<ZoneOperation>,
        filters: Mutex<Vec<String>>,
    }

    impl FakeCompute {
        fn new(items: Vec<ZoneOperation>) -> Self {
            Self {
                items,
                filters: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ZoneOperationsApi for FakeCompute {
        async fn list_operations(
            &self,
            _project: &str,
            _zone: &str,
            filter: &str,
        ) -> Result<Vec<ZoneOperation>, ApiError> {
            self.filters.lock().unwrap().push(filter.to_string());
            Ok(self.items.clone())
        }
    }

    fn failed_operation(events: Vec<OperationEvent>) -> Operation {
        Operation {
            name: "operations/op".to_string(),
            done: true,
            error: Some(Default::default()),
            metadata: OperationMetadata { events },
        }
    }

    fn assignment(instance: &str, zone: &str) -> OperationEvent {
        OperationEvent {
            description: None,
            details: Some(EventDetails {
                type_url: WORKER_ASSIGNED_EVENT.to_string(),
                instance: Some(instance.to_string()),
                zone: Some(zone.to_string()),
            }),
        }
    }

    fn preemption_record() -> ZoneOperation {
        ZoneOperation {
            operation_type: PREEMPTED_OPERATION_TYPE.to_string(),
            target_link: None,
        }
    }

    fn classifier(compute: &FakeCompute) -> FailureClassifier<'_> {
        FailureClassifier::new(compute, "my-project").with_settle_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_no_assignment_never_started() {
        let compute = FakeCompute::new(vec![preemption_record()]);
        let operation = failed_operation(Vec::new());

        let classification = classifier(&compute).classify(&operation).await.unwrap();
        assert_eq!(classification, Classification::NeverStarted);
        // No query was made; the answer is a pure function of the events
        assert!(compute.filters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preemption_record_confirms_preemption() {
        let compute = FakeCompute::new(vec![preemption_record()]);
        let operation = failed_operation(vec![assignment("worker-1", "us-central1-f")]);

        let classification = classifier(&compute).classify(&operation).await.unwrap();
        assert_eq!(classification, Classification::Preempted);

        let filters = compute.filters.lock().unwrap();
        assert_eq!(
            filters[0],
            "(targetLink eq https://www.googleapis.com/compute/v1/projects/my-project\
             /zones/us-central1-f/instances/worker-1) \
             (operationType eq compute.instances.preempted)"
        );
    }

    #[tokio::test]
    async fn test_empty_listing_is_unrelated() {
        let compute = FakeCompute::new(Vec::new());
        let operation = failed_operation(vec![assignment("worker-1", "us-central1-f")]);

        let classification = classifier(&compute).classify(&operation).await.unwrap();
        assert_eq!(classification, Classification::Unrelated);
    }

    #[tokio::test]
    async fn test_other_operation_types_do_not_count() {
        let compute = FakeCompute::new(vec![ZoneOperation {
            operation_type: "compute.instances.delete".to_string(),
            target_link: None,
        }]);
        let operation = failed_operation(vec![assignment("worker-1", "us-central1-f")]);

        let classification = classifier(&compute).classify(&operation).await.unwrap();
        assert_eq!(classification, Classification::Unrelated);
    }

    #[tokio::test]
    async fn test_last_assignment_event_is_queried() {
        let compute = FakeCompute::new(Vec::new());
        let operation = failed_operation(vec![
            assignment("worker-1", "us-central1-a"),
            assignment("worker-2", "us-central1-b"),
        ]);

        classifier(&compute).classify(&operation).await.unwrap();

        let filters = compute.filters.lock().unwrap();
        assert!(filters[0].contains("/zones/us-central1-b/instances/worker-2"));
    }
}
