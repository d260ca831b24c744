mod config;
mod logging;

use std::process::ExitCode;

use catalog_engine::{
    run_harvest, ChromiumDriver, ChromiumSettings, Credentials, HarvestError, ProgressSink,
    RunEvent, RunStage, RunSummary,
};
use harvest_logging::{harvest_debug, harvest_error, harvest_info};

const EMAIL_ENV: &str = "CATALOG_EMAIL";
const PASSWORD_ENV: &str = "CATALOG_PASSWORD";
const HEADLESS_ENV: &str = "CATALOG_HEADLESS";
const TARGET_URL_ENV: &str = "CATALOG_TARGET_URL";

/// Logs engine progress as it happens.
struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::Stage(RunStage::Wizard(step)) => {
                harvest_info!("Wizard step {step}");
            }
            RunEvent::Stage(stage) => harvest_info!("Stage: {stage:?}"),
            RunEvent::Collected { rows, passes } => {
                harvest_debug!("{rows} rows after {passes} passes");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    logging::initialize(logging::LogDestination::Both);

    match run() {
        Ok(summary) => {
            report(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            harvest_error!("Harvest failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunSummary, AppError> {
    let mut app_config = config::load()?;
    if let Ok(url) = std::env::var(TARGET_URL_ENV) {
        app_config.target_url = url;
    }
    let harvest_config = app_config.to_harvest_config()?;

    let credentials = Credentials {
        identifier: std::env::var(EMAIL_ENV).unwrap_or_default(),
        secret: std::env::var(PASSWORD_ENV).unwrap_or_default(),
    };
    let settings = ChromiumSettings {
        headless: env_flag(HEADLESS_ENV, true),
    };

    let runtime = tokio::runtime::Runtime::new().map_err(AppError::Runtime)?;
    let summary = runtime.block_on(async {
        let driver = ChromiumDriver::launch(&settings)
            .await
            .map_err(HarvestError::Driver)?;
        // The browser is the run's single shared resource; close it on every
        // exit path before surfacing the result.
        let result = run_harvest(&driver, &harvest_config, &credentials, &LogSink).await;
        driver.close().await;
        result
    })?;
    Ok(summary)
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn report(summary: &RunSummary) {
    if summary.session_reused {
        harvest_info!("Authenticated via stored session");
    }
    match summary.target_hint {
        Some(target) if target > 0 => {
            let ratio = summary.records as f64 / target as f64 * 100.0;
            harvest_info!(
                "Collected {}/{} records ({ratio:.1}%) in {} passes",
                summary.records,
                target,
                summary.passes
            );
        }
        _ => {
            harvest_info!(
                "Collected {} records in {} passes",
                summary.records,
                summary.passes
            );
        }
    }
    if summary.skipped > 0 {
        harvest_info!("{} rows skipped by normalization", summary.skipped);
    }
    if summary.truncated {
        harvest_info!("Collection hit the safety cap; snapshot may be incomplete");
    }
    harvest_info!("Snapshot written to {:?}", summary.output_path);
}
