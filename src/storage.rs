//! Pre-flight existence checks for job inputs in Google Cloud Storage.
//!
//! Every referenced `gs://` object is verified before anything is
//! submitted, so a typo fails in seconds instead of after a billable
//! worker has started. The whole pass can be skipped from the CLI.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::JobConfig;

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether `gs_path` (`gs://bucket/object`) names an existing object.
    async fn exists(&self, gs_path: &str) -> Result<bool>;
}

pub struct GcsClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl GcsClient {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self::with_base_url(http, token, DEFAULT_BASE_URL.to_string())
    }

    /// Overrides the API endpoint, for tests.
    pub fn with_base_url(http: reqwest::Client, token: String, base_url: String) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn split_gs_path(gs_path: &str) -> Result<(&str, &str)> {
    let rest = gs_path
        .strip_prefix("gs://")
        .with_context(|| format!("Not a gs:// path: {gs_path}"))?;
    rest.split_once('/')
        .filter(|(bucket, object)| !bucket.is_empty() && !object.is_empty())
        .with_context(|| format!("Not a gs:// object path: {gs_path}"))
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn exists(&self, gs_path: &str) -> Result<bool> {
        let (bucket, object) = split_gs_path(gs_path)?;

        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid storage endpoint: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid storage endpoint: {}", self.base_url))?
            .extend(["storage", "v1", "b", bucket, "o", object]);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to query storage for {gs_path}"))?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            anyhow::bail!("Storage returned {status} for {gs_path}")
        }
    }
}

fn values(field: &Option<String>) -> Vec<&str> {
    field
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.split(',').collect())
        .unwrap_or_default()
}

async fn require(store: &dyn ObjectStore, gs_path: &str, what: &str) -> Result<()> {
    if !store.exists(gs_path).await? {
        anyhow::bail!("Could not find {what} {gs_path}");
    }
    Ok(())
}

/// Verifies that every input the job references exists.
pub async fn check_inputs_exist(store: &dyn ObjectStore, config: &JobConfig) -> Result<()> {
    // The DBSNP, BQSR and Realign sites files, with their indexes
    let mut sites_files = Vec::new();
    sites_files.extend(values(&config.bqsr_sites));
    sites_files.extend(values(&config.realign_sites));
    sites_files.extend(values(&config.dbsnp));
    for sites_file in sites_files {
        require(store, sites_file, "supplied file").await?;
        let index = if sites_file.ends_with("vcf.gz") {
            format!("{sites_file}.tbi")
        } else {
            format!("{sites_file}.idx")
        };
        if !store.exists(&index).await? {
            anyhow::bail!("Could not find index for file {sites_file}");
        }
    }

    // The data input files
    for field in [
        &config.fq1,
        &config.tumor_fq1,
        &config.fq2,
        &config.tumor_fq2,
        &config.bam,
        &config.tumor_bam,
    ] {
        for input_file in values(field) {
            require(store, input_file, "the supplied file").await?;
        }
    }

    // All reference files
    let Some(reference) = config.reference.as_deref().filter(|r| !r.is_empty()) else {
        anyhow::bail!("Reference file not found");
    };
    let ref_base = reference
        .strip_suffix(".fa")
        .or_else(|| reference.strip_suffix(".fasta"))
        .unwrap_or(reference);
    require(store, reference, "reference file").await?;
    if !store.exists(&format!("{reference}.fai")).await? {
        anyhow::bail!("Reference fai index not found");
    }
    if !store.exists(&format!("{reference}.dict")).await?
        && !store.exists(&format!("{ref_base}.dict")).await?
    {
        anyhow::bail!("Reference dict index not found");
    }

    // FQ specific
    let has_fastq = !values(&config.fq1).is_empty() || !values(&config.tumor_fq1).is_empty();
    if has_fastq {
        for suffix in [".amb", ".ann", ".bwt", ".pac", ".sa"] {
            if !store.exists(&format!("{reference}{suffix}")).await?
                && !store.exists(&format!("{reference}.64{suffix}")).await?
            {
                anyhow::bail!("Reference BWA index {suffix} not found");
            }
        }
    }

    // BAM specific
    for field in [&config.bam, &config.tumor_bam] {
        for bam in values(field) {
            let alt_index = bam.strip_suffix(".bam").map(|base| format!("{base}.bai"));
            let mut found = store.exists(&format!("{bam}.bai")).await?;
            if !found {
                if let Some(alt_index) = alt_index {
                    found = store.exists(&alt_index).await?;
                }
            }
            if !found {
                anyhow::bail!("BAM supplied but BAI not found");
            }
        }
    }

    Ok(())
}
