//! Job configuration: a JSON document merged over built-in defaults.
//!
//! Keys keep their configuration-file spelling (`FQ1`, `BQSR_SITES`, ...)
//! because they double as the environment parameter names forwarded to
//! the pipeline container. Missing keys take the built-in defaults;
//! unrecognized keys are retained so workflow parameters added to the
//! catalog keep working without a struct change.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct JobConfig {
    pub pipeline: String,
    pub project_id: Option<String>,
    pub output_bucket: Option<String>,
    pub machine_type: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub disk_size: u32,
    pub docker_image: String,
    pub zones: Option<String>,

    pub fq1: Option<String>,
    pub fq2: Option<String>,
    pub tumor_fq1: Option<String>,
    pub tumor_fq2: Option<String>,
    pub bam: Option<String>,
    pub tumor_bam: Option<String>,
    pub readgroup: Option<String>,
    pub tumor_readgroup: Option<String>,
    #[serde(rename = "REF")]
    pub reference: Option<String>,
    pub bqsr_sites: Option<String>,
    pub realign_sites: Option<String>,
    pub dbsnp: Option<String>,
    pub interval: Option<String>,
    pub interval_file: Option<String>,

    pub no_haplotyper: bool,
    pub no_metrics: bool,
    pub no_bam_output: bool,
    pub no_vcf: bool,
    pub recalibrated_output: bool,
    pub run_tnsnv: bool,

    #[serde(deserialize_with = "lenient_u32")]
    pub preemptible_tries: u32,
    pub nonpreemptible_try: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            pipeline: String::new(),
            project_id: None,
            output_bucket: None,
            machine_type: "n1-standard-1".to_string(),
            disk_size: 300,
            docker_image: "sentieon/sentieon-google-cloud:latest".to_string(),
            zones: None,
            fq1: None,
            fq2: None,
            tumor_fq1: None,
            tumor_fq2: None,
            bam: None,
            tumor_bam: None,
            readgroup: None,
            tumor_readgroup: None,
            reference: None,
            bqsr_sites: None,
            realign_sites: None,
            dbsnp: None,
            interval: None,
            interval_file: None,
            no_haplotyper: false,
            no_metrics: false,
            no_bam_output: false,
            no_vcf: false,
            recalibrated_output: false,
            run_tnsnv: false,
            preemptible_tries: 0,
            nonpreemptible_try: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Accepts both JSON numbers and numeric strings for integer settings.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientU32;

    impl Visitor<'_> for LenientU32 {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an unsigned integer or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("{value} is out of range")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("{value} is out of range")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u32, E> {
            value
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("cannot parse {value:?} as an integer")))
        }
    }

    deserializer.deserialize_any(LenientU32)
}

/// Treats missing values and empty strings alike, matching how the
/// configuration file is written in practice.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl JobConfig {
    /// Loads a job configuration file over the built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: JobConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.normalize();
        config.warn_deprecated();
        Ok(config)
    }

    /// Strips trailing slashes from the output bucket so runs don't
    /// create near-empty directories.
    fn normalize(&mut self) {
        if let Some(bucket) = &mut self.output_bucket {
            while bucket.ends_with('/') {
                bucket.pop();
            }
        }
    }

    fn warn_deprecated(&self) {
        if self.extra.contains_key("MIN_RAM_GB") || self.extra.contains_key("MIN_CPU") {
            log::warn!(
                "'MIN_RAM_GB' and 'MIN_CPU' are now ignored. \
                 Please use 'MACHINE_TYPE' to specify the instance type"
            );
        }
    }

    pub fn is_germline(&self) -> bool {
        matches!(self.pipeline.as_str(), "DNA" | "DNAscope" | "DNAseq")
    }

    pub fn is_somatic(&self) -> bool {
        matches!(self.pipeline.as_str(), "TN" | "TNscope" | "TNseq")
    }

    pub fn zones(&self) -> Vec<String> {
        present(&self.zones)
            .map(|zones| zones.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Basic error checking to fail early, before anything is submitted.
    pub fn validate(&self) -> Result<()> {
        if !self.is_germline() && !self.is_somatic() {
            anyhow::bail!("DNAseq, DNAscope, TNseq, and TNscope are currently supported");
        }

        if present(&self.project_id).is_none() {
            anyhow::bail!("Please supply a PROJECT_ID");
        }
        if present(&self.output_bucket).is_none() {
            anyhow::bail!("Please supply an OUTPUT_BUCKET");
        }

        // Shared errors
        if present(&self.fq1).is_some() && present(&self.bam).is_some() {
            anyhow::bail!("Please supply either 'FQ1' or 'BAM' (not both)");
        }
        if present(&self.interval).is_some() && present(&self.interval_file).is_some() {
            anyhow::bail!("Please supply either 'INTERVAL' or 'INTERVAL_FILE'");
        }
        if let (Some(fq1), Some(readgroup)) = (present(&self.fq1), present(&self.readgroup)) {
            if fq1.split(',').count() != readgroup.split(',').count() {
                anyhow::bail!(
                    "The number of fastq files must match the number of supplied readgroups"
                );
            }
        }

        // Pipeline specific errors
        if self.is_germline() {
            if present(&self.fq1).is_none() && present(&self.bam).is_none() {
                anyhow::bail!("Please supply either 'FQ1' or 'BAM'");
            }
            if self.no_haplotyper && self.no_metrics && self.no_bam_output {
                anyhow::bail!("No output files requested");
            }
            if self.recalibrated_output && present(&self.bqsr_sites).is_none() {
                anyhow::bail!(
                    "Cannot output a recalibrated BAM file without running BQSR. \
                     Please supply 'BQSR_SITES'"
                );
            }
        } else {
            if present(&self.tumor_fq1).is_some() && present(&self.tumor_bam).is_some() {
                anyhow::bail!("Please supply either 'TUMOR_FQ1' or 'TUMOR_BAM' (not both)");
            }
            if present(&self.tumor_fq1).is_none() && present(&self.tumor_bam).is_none() {
                anyhow::bail!("Please supply either 'TUMOR_FQ1' or 'TUMOR_BAM'");
            }
            if self.run_tnsnv && present(&self.realign_sites).is_none() {
                anyhow::bail!(
                    "TNsnv requires indel realignment. Please supply 'REALIGN_SITES'"
                );
            }
            if self.no_bam_output && self.no_vcf && self.no_metrics {
                anyhow::bail!("No output files requested");
            }
            if let (Some(fq1), Some(readgroup)) =
                (present(&self.tumor_fq1), present(&self.tumor_readgroup))
            {
                if fq1.split(',').count() != readgroup.split(',').count() {
                    anyhow::bail!(
                        "The number of tumor fastq files must match the number of \
                         supplied readgroups"
                    );
                }
            }
        }

        if self.preemptible_tries == 0 && !self.nonpreemptible_try {
            anyhow::bail!(
                "No attempts allowed: set PREEMPTIBLE_TRIES > 0 or NONPREEMPTIBLE_TRY"
            );
        }

        Ok(())
    }

    /// Looks up a workflow environment parameter by its config key.
    ///
    /// Returns `None` only for null/missing values; booleans and numbers
    /// are stringified since the pipeline environment is a string map.
    pub fn param(&self, name: &str) -> Option<String> {
        let some = |value: &str| Some(value.to_string());
        match name {
            "PIPELINE" => some(&self.pipeline),
            "PROJECT_ID" => self.project_id.clone(),
            "OUTPUT_BUCKET" => self.output_bucket.clone(),
            "MACHINE_TYPE" => some(&self.machine_type),
            "DISK_SIZE" => Some(self.disk_size.to_string()),
            "DOCKER_IMAGE" => some(&self.docker_image),
            "ZONES" => self.zones.clone(),
            "FQ1" => self.fq1.clone(),
            "FQ2" => self.fq2.clone(),
            "TUMOR_FQ1" => self.tumor_fq1.clone(),
            "TUMOR_FQ2" => self.tumor_fq2.clone(),
            "BAM" => self.bam.clone(),
            "TUMOR_BAM" => self.tumor_bam.clone(),
            "READGROUP" => self.readgroup.clone(),
            "TUMOR_READGROUP" => self.tumor_readgroup.clone(),
            "REF" => self.reference.clone(),
            "BQSR_SITES" => self.bqsr_sites.clone(),
            "REALIGN_SITES" => self.realign_sites.clone(),
            "DBSNP" => self.dbsnp.clone(),
            "INTERVAL" => self.interval.clone(),
            "INTERVAL_FILE" => self.interval_file.clone(),
            "NO_HAPLOTYPER" => Some(self.no_haplotyper.to_string()),
            "NO_METRICS" => Some(self.no_metrics.to_string()),
            "NO_BAM_OUTPUT" => Some(self.no_bam_output.to_string()),
            "NO_VCF" => Some(self.no_vcf.to_string()),
            "RECALIBRATED_OUTPUT" => Some(self.recalibrated_output.to_string()),
            "RUN_TNSNV" => Some(self.run_tnsnv.to_string()),
            other => match self.extra.get(other) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(value) => Some(value.to_string()),
            },
        }
    }
}
