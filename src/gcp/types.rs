//! Wire types for the Genomics v2alpha1 operation lifecycle and the
//! Compute zone-operations listing.
//!
//! Only the fields the runner actually reads are modeled; everything else
//! in the responses is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Event detail type tag marking the moment a job was bound to a worker
/// instance. Failures are only classifiable once one of these exists.
pub const WORKER_ASSIGNED_EVENT: &str =
    "type.googleapis.com/google.genomics.v2alpha1.WorkerAssignedEvent";

/// Compute operation type recorded when an instance is reclaimed.
pub const PREEMPTED_OPERATION_TYPE: &str = "compute.instances.preempted";

/// Opaque identifier for a submitted pipeline run, as returned by
/// `pipelines:run`. Valid for the lifetime of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A long-running operation as reported by the Genomics API.
///
/// `done == false` means the run is still in flight and `error` is absent;
/// `done == true` is terminal and the operation is never polled again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub metadata: OperationMetadata,
}

impl Operation {
    /// Returns `{instance, zone}` from the most recent worker-assignment
    /// event, or `None` if the job was never bound to a worker.
    pub fn last_worker_assignment(&self) -> Option<WorkerAssignment<'_>> {
        self.metadata
            .events
            .iter()
            .rev()
            .filter_map(|event| event.details.as_ref())
            .find(|details| details.type_url == WORKER_ASSIGNED_EVENT)
            .and_then(|details| {
                Some(WorkerAssignment {
                    instance: details.instance.as_deref()?,
                    zone: details.zone.as_deref()?,
                })
            })
    }
}

/// Instance binding extracted from a worker-assignment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAssignment<'a> {
    pub instance: &'a str,
    pub zone: &'a str,
}

/// `google.rpc.Status` payload of a failed operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    #[serde(default)]
    pub events: Vec<OperationEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EventDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(rename = "@type", default)]
    pub type_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// One entry of a zone-operations listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOperation {
    #[serde(default)]
    pub operation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
}

/// Response body of `zoneOperations.list`. `items` is absent when the
/// filter matched nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneOperationList {
    #[serde(default)]
    pub items: Option<Vec<ZoneOperation>>,
}

/// Request body of `pipelines:run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunPipelineRequest {
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    pub actions: Vec<Action>,
    pub resources: Resources,
    pub environment: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub project_id: String,
    pub zones: Vec<String>,
    pub virtual_machine: VirtualMachine,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub machine_type: String,
    pub preemptible: bool,
    pub disks: Vec<Disk>,
    pub service_account: ServiceAccount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_platform: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    #[serde(rename = "type")]
    pub disk_type: String,
    pub size_gb: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceAccount {
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    pub image_uri: String,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub disk: String,
    pub path: String,
    pub read_only: bool,
}
