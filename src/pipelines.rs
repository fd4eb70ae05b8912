//! Static catalog of the supported workflows.
//!
//! Each workflow names its container entrypoint and the environment
//! parameters forwarded to it. Parameter values come from the job
//! configuration; absent values are forwarded as the literal "None",
//! which the entrypoint scripts treat as unset.

use crate::config::JobConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Germline,
    Somatic,
}

#[derive(Debug, Clone, Copy)]
pub struct Workflow {
    pub kind: WorkflowKind,
    pub entrypoint: &'static str,
    pub input_parameters: &'static [&'static str],
}

static GERMLINE: Workflow = Workflow {
    kind: WorkflowKind::Germline,
    entrypoint: "/opt/sentieon/gc_germline.sh",
    input_parameters: &[
        "PIPELINE",
        "OUTPUT_BUCKET",
        "REF",
        "FQ1",
        "FQ2",
        "BAM",
        "READGROUP",
        "BQSR_SITES",
        "REALIGN_SITES",
        "DBSNP",
        "INTERVAL",
        "INTERVAL_FILE",
        "NO_HAPLOTYPER",
        "NO_METRICS",
        "NO_BAM_OUTPUT",
        "RECALIBRATED_OUTPUT",
    ],
};

static SOMATIC: Workflow = Workflow {
    kind: WorkflowKind::Somatic,
    entrypoint: "/opt/sentieon/gc_somatic.sh",
    input_parameters: &[
        "PIPELINE",
        "OUTPUT_BUCKET",
        "REF",
        "FQ1",
        "FQ2",
        "BAM",
        "READGROUP",
        "TUMOR_FQ1",
        "TUMOR_FQ2",
        "TUMOR_BAM",
        "TUMOR_READGROUP",
        "BQSR_SITES",
        "REALIGN_SITES",
        "DBSNP",
        "INTERVAL",
        "INTERVAL_FILE",
        "RUN_TNSNV",
        "NO_VCF",
        "NO_METRICS",
        "NO_BAM_OUTPUT",
    ],
};

/// Resolves the workflow for a validated configuration.
pub fn workflow_for(config: &JobConfig) -> Option<&'static Workflow> {
    if config.is_germline() {
        Some(&GERMLINE)
    } else if config.is_somatic() {
        Some(&SOMATIC)
    } else {
        None
    }
}
