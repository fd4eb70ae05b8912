//! Shared fakes for orchestration tests.
//!
//! `FakePipelines` replays a scripted poll sequence per submission and
//! records every request body, so tests can assert how many attempts ran
//! and which capacity each one asked for. `FakeCompute` replays one
//! zone-operations listing per classification query.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use genrun::gcp::types::{
    EventDetails, Operation, OperationError, OperationEvent, OperationHandle, OperationMetadata,
    RunPipelineRequest, ZoneOperation, PREEMPTED_OPERATION_TYPE, WORKER_ASSIGNED_EVENT,
};
use genrun::gcp::{ApiError, PipelinesApi, ZoneOperationsApi};

pub enum PollStep {
    Operation(Operation),
    TransportError,
}

pub struct FakePipelines {
    plans: Mutex<VecDeque<Vec<PollStep>>>,
    live: Mutex<VecDeque<PollStep>>,
    pub submissions: Mutex<Vec<RunPipelineRequest>>,
}

impl FakePipelines {
    /// One plan per expected submission: the sequence of poll results
    /// that attempt will produce.
    pub fn new(plans: Vec<Vec<PollStep>>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            live: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// The preemptible flag of each submitted request, in order.
    pub fn submitted_modes(&self) -> Vec<bool> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.pipeline.resources.virtual_machine.preemptible)
            .collect()
    }
}

#[async_trait]
impl PipelinesApi for FakePipelines {
    async fn run_pipeline(
        &self,
        request: &RunPipelineRequest,
    ) -> Result<OperationHandle, ApiError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        let attempt = submissions.len();

        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected submission #{attempt}"));
        *self.live.lock().unwrap() = plan.into();

        Ok(OperationHandle(format!("operations/op-{attempt}")))
    }

    async fn get_operation(&self, handle: &OperationHandle) -> Result<Operation, ApiError> {
        match self.live.lock().unwrap().pop_front() {
            Some(PollStep::Operation(operation)) => Ok(operation),
            Some(PollStep::TransportError) => {
                Err(ApiError::Transport("connection reset".to_string()))
            }
            None => panic!("unexpected poll of {handle}"),
        }
    }
}

pub struct FakeCompute {
    listings: Mutex<VecDeque<Vec<ZoneOperation>>>,
    pub queries: Mutex<Vec<(String, String, String)>>,
}

impl FakeCompute {
    /// One listing per expected classification query.
    pub fn new(listings: Vec<Vec<ZoneOperation>>) -> Self {
        Self {
            listings: Mutex::new(listings.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn preempted_every_time(queries: usize) -> Self {
        Self::new(vec![vec![preemption_record()]; queries])
    }
}

#[async_trait]
impl ZoneOperationsApi for FakeCompute {
    async fn list_operations(
        &self,
        project: &str,
        zone: &str,
        filter: &str,
    ) -> Result<Vec<ZoneOperation>, ApiError> {
        self.queries
            .lock()
            .unwrap()
            .push((project.to_string(), zone.to_string(), filter.to_string()));
        Ok(self
            .listings
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected zone-operations query"))
    }
}

pub fn preemption_record() -> ZoneOperation {
    ZoneOperation {
        operation_type: PREEMPTED_OPERATION_TYPE.to_string(),
        target_link: None,
    }
}

pub fn running() -> PollStep {
    PollStep::Operation(Operation {
        name: "operations/op".to_string(),
        done: false,
        ..Default::default()
    })
}

pub fn succeeded() -> PollStep {
    PollStep::Operation(Operation {
        name: "operations/op".to_string(),
        done: true,
        ..Default::default()
    })
}

pub fn failed_without_worker() -> PollStep {
    PollStep::Operation(Operation {
        name: "operations/op".to_string(),
        done: true,
        error: Some(OperationError {
            code: 9,
            message: "failed to pull image".to_string(),
        }),
        ..Default::default()
    })
}

pub fn failed_on_worker(instance: &str, zone: &str) -> PollStep {
    PollStep::Operation(Operation {
        name: "operations/op".to_string(),
        done: true,
        error: Some(OperationError {
            code: 10,
            message: "the operation was aborted".to_string(),
        }),
        metadata: OperationMetadata {
            events: vec![OperationEvent {
                description: Some("worker assigned".to_string()),
                details: Some(EventDetails {
                    type_url: WORKER_ASSIGNED_EVENT.to_string(),
                    instance: Some(instance.to_string()),
                    zone: Some(zone.to_string()),
                }),
            }],
        },
    })
}
