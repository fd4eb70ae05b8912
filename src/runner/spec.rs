//! Assembly of the pipeline request payload.
//!
//! `JobSpec` is built once from the validated configuration and never
//! mutated; each attempt gets a fresh `RunPipelineRequest` with the
//! preemptible flag for that attempt baked in.

use std::collections::BTreeMap;

use crate::config::JobConfig;
use crate::gcp::types::{
    Action, Disk, Mount, Pipeline, Resources, RunPipelineRequest, ServiceAccount, VirtualMachine,
};
use crate::pipelines::Workflow;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const WORK_DISK_NAME: &str = "local-disk";
const WORK_DISK_MOUNT: &str = "/mnt/work";

/// Immutable description of one job: what to run, where, and with which
/// environment. The preemptible flag is supplied per attempt.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub resources: Resources,
    pub environment: BTreeMap<String, String>,
    pub actions: Vec<Action>,
}

impl JobSpec {
    pub fn from_config(config: &JobConfig, workflow: &Workflow) -> Self {
        let resources = Resources {
            project_id: config.project_id.clone().unwrap_or_default(),
            zones: config.zones(),
            virtual_machine: VirtualMachine {
                machine_type: config.machine_type.clone(),
                // Overwritten per attempt by `to_request`
                preemptible: false,
                disks: vec![Disk {
                    name: WORK_DISK_NAME.to_string(),
                    disk_type: "local-ssd".to_string(),
                    size_gb: config.disk_size,
                }],
                service_account: ServiceAccount {
                    scopes: vec![CLOUD_PLATFORM_SCOPE.to_string()],
                },
                // n1-highcpu-96 is only available on Skylake hosts
                cpu_platform: (config.machine_type == "n1-highcpu-96")
                    .then(|| "Intel Skylake".to_string()),
            },
        };

        let environment = workflow
            .input_parameters
            .iter()
            .map(|name| {
                let value = config.param(name).unwrap_or_else(|| "None".to_string());
                (name.to_string(), value)
            })
            .collect();

        let output_bucket = config.output_bucket.clone().unwrap_or_default();
        let run_action = Action {
            name: "run-pipeline".to_string(),
            image_uri: config.docker_image.clone(),
            commands: vec!["/bin/bash".to_string(), workflow.entrypoint.to_string()],
            mounts: vec![Mount {
                disk: WORK_DISK_NAME.to_string(),
                path: WORK_DISK_MOUNT.to_string(),
                read_only: false,
            }],
            flags: Vec::new(),
        };
        let cleanup_action = Action {
            name: "cleanup".to_string(),
            image_uri: config.docker_image.clone(),
            commands: vec![
                "/bin/bash".to_string(),
                "-c".to_string(),
                format!(
                    "gsutil cp /google/logs/action/1/stderr \
                     \"{output_bucket}/worker_logs/stderr.txt\" && \
                     gsutil cp /google/logs/action/1/stdout \
                     \"{output_bucket}/worker_logs/stdout.txt\""
                ),
            ],
            mounts: Vec::new(),
            flags: vec!["ALWAYS_RUN".to_string()],
        };

        Self {
            resources,
            environment,
            actions: vec![run_action, cleanup_action],
        }
    }

    /// Builds the request body for one attempt.
    pub fn to_request(&self, preemptible: bool) -> RunPipelineRequest {
        let mut resources = self.resources.clone();
        resources.virtual_machine.preemptible = preemptible;
        RunPipelineRequest {
            pipeline: Pipeline {
                actions: self.actions.clone(),
                resources,
                environment: self.environment.clone(),
            },
        }
    }
}
