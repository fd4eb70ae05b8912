use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;

use genrun::config::JobConfig;
use genrun::gcp::{auth, ComputeClient, GenomicsClient};
use genrun::pipelines::workflow_for;
use genrun::runner::{JobSpec, OperationPoller, Outcome, RetryBudget, Runner};
use genrun::storage::{self, GcsClient};

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let matches = Command::new("genrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs genomics workflow pipelines on Google Cloud with preemption-aware retry")
        .arg(
            Arg::new("pipeline_config")
                .value_name("FILE")
                .required(true)
                .help("The json configuration file"),
        )
        .arg(
            Arg::new("no-check-inputs-exist")
                .long("no-check-inputs-exist")
                .action(ArgAction::SetTrue)
                .help("Do not check that the input files exist before running the pipeline"),
        )
        .arg(
            Arg::new("polling-interval")
                .long("polling-interval")
                .value_name("SECONDS")
                .default_value("30")
                .help("Seconds between polling the running operation"),
        )
        .arg(
            Arg::new("poll-transport-retries")
                .long("poll-transport-retries")
                .value_name("COUNT")
                .default_value("0")
                .help(
                    "Consecutive poll-level transport errors tolerated before aborting \
                     (0 aborts on the first one)",
                ),
        )
        .get_matches();

    match run(&matches).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<Outcome> {
    let config_path = matches
        .get_one::<String>("pipeline_config")
        .context("missing configuration file argument")?;
    let polling_interval: f64 = matches
        .get_one::<String>("polling-interval")
        .context("missing polling interval")?
        .parse()
        .context("polling interval must be a number of seconds")?;
    if !polling_interval.is_finite() || polling_interval < 0.0 {
        anyhow::bail!("polling interval must be a non-negative number of seconds");
    }
    let poll_transport_retries: u32 = matches
        .get_one::<String>("poll-transport-retries")
        .context("missing poll transport retry count")?
        .parse()
        .context("poll transport retries must be a non-negative integer")?;

    let config = JobConfig::load(Path::new(config_path))?;
    config.validate()?;
    let workflow = workflow_for(&config).context("unsupported pipeline")?;
    let project = config
        .project_id
        .clone()
        .context("Please supply a PROJECT_ID")?;

    let http = reqwest::Client::new();
    let token = auth::access_token(&http).await?;

    if matches.get_flag("no-check-inputs-exist") {
        info!("Skipping input existence checks");
    } else {
        let store = GcsClient::new(http.clone(), token.clone());
        storage::check_inputs_exist(&store, &config).await?;
        info!("All referenced inputs exist");
    }

    let spec = JobSpec::from_config(&config, workflow);
    let budget = RetryBudget::new(config.preemptible_tries, config.nonpreemptible_try);
    let poller = OperationPoller::new(Duration::from_secs_f64(polling_interval))
        .with_transport_retries(poll_transport_retries);

    let pipelines = GenomicsClient::new(http.clone(), token.clone());
    let compute = ComputeClient::new(http, token);

    let outcome = Runner::new(&pipelines, &compute, &project, spec, budget, poller)
        .run()
        .await?;

    match outcome {
        Outcome::Succeeded => info!("Operation succeeded"),
        Outcome::ExhaustedWhilePreempted => info!("Final run failed due to preemption"),
        Outcome::FailedBeforeStart => info!("Pipeline operation failed before running"),
        Outcome::FailedUnrelated => info!("Final run failed, not due to preemption"),
    }

    Ok(outcome)
}
