//! Fixed-interval polling of a live operation until it reaches a
//! terminal state.

use std::time::Duration;

use crate::gcp::types::{Operation, OperationHandle};
use crate::gcp::{ApiError, PipelinesApi};

/// Blocks (cooperatively) until the operation reports `done`.
///
/// A transport error while polling is fatal by default and surfaces to
/// the caller, which aborts the whole orchestration — remaining retry
/// budget included. `transport_retries` relaxes that: up to that many
/// consecutive poll failures are logged and retried, with the count
/// reset on any successful poll. The default of zero preserves the
/// strict behavior.
#[derive(Debug, Clone)]
pub struct OperationPoller {
    interval: Duration,
    transport_retries: u32,
}

impl OperationPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            transport_retries: 0,
        }
    }

    pub fn with_transport_retries(mut self, transport_retries: u32) -> Self {
        self.transport_retries = transport_retries;
        self
    }

    pub async fn await_terminal(
        &self,
        pipelines: &dyn PipelinesApi,
        handle: &OperationHandle,
    ) -> Result<Operation, ApiError> {
        let mut consecutive_failures = 0u32;
        loop {
            tokio::time::sleep(self.interval).await;

            match pipelines.get_operation(handle).await {
                Ok(operation) => {
                    consecutive_failures = 0;
                    if operation.done {
                        return Ok(operation);
                    }
                    log::debug!("Operation {handle} still running");
                }
                Err(err @ ApiError::Transport(_)) if consecutive_failures < self.transport_retries => {
                    consecutive_failures += 1;
                    log::warn!(
                        "Poll failed ({consecutive_failures}/{}), retrying: {err}",
                        self.transport_retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::types::RunPipelineRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Yields a scripted sequence of poll results.
    struct ScriptedApi {
        polls: Mutex<Vec<Result<Operation, ApiError>>>,
    }

    impl ScriptedApi {
        fn new(polls: Vec<Result<Operation, ApiError>>) -> Self {
            Self {
                polls: Mutex::new(polls),
            }
        }
    }

    #[async_trait]
    impl PipelinesApi for ScriptedApi {
        async fn run_pipeline(
            &self,
            _request: &RunPipelineRequest,
        ) -> Result<OperationHandle, ApiError> {
            unimplemented!("not used by the poller")
        }

        async fn get_operation(&self, _handle: &OperationHandle) -> Result<Operation, ApiError> {
            self.polls.lock().unwrap().remove(0)
        }
    }

    fn running() -> Operation {
        Operation {
            name: "operations/op".to_string(),
            done: false,
            ..Default::default()
        }
    }

    fn finished() -> Operation {
        Operation {
            name: "operations/op".to_string(),
            done: true,
            ..Default::default()
        }
    }

    fn transport_error() -> ApiError {
        ApiError::Transport("connection reset".to_string())
    }

    #[tokio::test]
    async fn test_polls_until_done() {
        let api = ScriptedApi::new(vec![Ok(running()), Ok(running()), Ok(finished())]);
        let poller = OperationPoller::new(Duration::ZERO);
        let handle = OperationHandle("operations/op".to_string());

        let operation = poller.await_terminal(&api, &handle).await.unwrap();
        assert!(operation.done);
        assert!(api.polls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_fatal_by_default() {
        let api = ScriptedApi::new(vec![Ok(running()), Err(transport_error()), Ok(finished())]);
        let poller = OperationPoller::new(Duration::ZERO);
        let handle = OperationHandle("operations/op".to_string());

        let err = poller.await_terminal(&api, &handle).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        // The terminal operation was never read
        assert_eq!(api.polls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_transport_retries() {
        let api = ScriptedApi::new(vec![
            Err(transport_error()),
            Err(transport_error()),
            Ok(finished()),
        ]);
        let poller = OperationPoller::new(Duration::ZERO).with_transport_retries(2);
        let handle = OperationHandle("operations/op".to_string());

        let operation = poller.await_terminal(&api, &handle).await.unwrap();
        assert!(operation.done);
    }

    #[tokio::test]
    async fn test_retry_budget_is_consecutive() {
        let api = ScriptedApi::new(vec![
            Err(transport_error()),
            Ok(running()),
            Err(transport_error()),
            Ok(finished()),
        ]);
        let poller = OperationPoller::new(Duration::ZERO).with_transport_retries(1);
        let handle = OperationHandle("operations/op".to_string());

        let operation = poller.await_terminal(&api, &handle).await.unwrap();
        assert!(operation.done);
    }

    #[tokio::test]
    async fn test_http_error_never_retried() {
        let api = ScriptedApi::new(vec![
            Err(ApiError::Http {
                status: 403,
                body: "forbidden".to_string(),
            }),
            Ok(finished()),
        ]);
        let poller = OperationPoller::new(Duration::ZERO).with_transport_retries(5);
        let handle = OperationHandle("operations/op".to_string());

        let err = poller.await_terminal(&api, &handle).await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 403, .. }));
    }
}
