use std::path::PathBuf;

use catalog_core::{normalize_row, ColumnSchema, WizardPlan};
use harvest_logging::{harvest_debug, harvest_info};

use crate::auth::{AuthSelectors, Authenticator, Credentials};
use crate::driver::PageDriver;
use crate::export::{ExtractionResult, SnapshotWriter};
use crate::extract::{ExtractSettings, TableExtractor};
use crate::rows::IdentityStrategy;
use crate::session::SessionStore;
use crate::types::{HarvestError, ProgressSink, RunEvent, RunStage};
use crate::wizard::{WizardNavigator, WizardSettings};

/// Everything one deployment configures: where the data lives, how to reach
/// it, and how to read it. Assembled by the caller (the CLI reads it from a
/// config file); the engine never discovers any of this from the page.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub target_url: String,
    pub session_path: PathBuf,
    pub output_path: PathBuf,
    pub auth: AuthSelectors,
    pub plan: WizardPlan,
    pub wizard: WizardSettings,
    pub table_selector: String,
    pub empty_marker: String,
    pub identity: IdentityStrategy,
    pub schema: ColumnSchema,
    pub extract: ExtractSettings,
    /// Bound on the session probe's wait for the authenticated marker.
    pub probe_timeout: std::time::Duration,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub skipped: usize,
    pub passes: u32,
    pub truncated: bool,
    pub target_hint: Option<u64>,
    pub session_reused: bool,
    pub output_path: PathBuf,
}

/// Executes the whole pipeline against one driver: session reuse or login,
/// wizard, extraction, normalization, snapshot write.
///
/// The driver is the single shared resource of the run; the caller owns its
/// lifecycle and releases it on every exit path.
pub async fn run_harvest(
    driver: &dyn PageDriver,
    config: &HarvestConfig,
    credentials: &Credentials,
    sink: &dyn ProgressSink,
) -> Result<RunSummary, HarvestError> {
    sink.emit(RunEvent::Stage(RunStage::Session));
    let store = SessionStore::new(
        config.session_path.clone(),
        config.auth.authenticated_marker.clone(),
        config.probe_timeout,
    );

    let mut session_reused = false;
    if let Some(blob) = store.load() {
        if store.probe(driver, &config.target_url, &blob).await? {
            harvest_info!("Stored session is valid; skipping login");
            session_reused = true;
        } else {
            harvest_info!("Stored session failed probe; re-authenticating");
        }
    }

    if !session_reused {
        sink.emit(RunEvent::Stage(RunStage::Login));
        driver.navigate(&config.target_url).await?;
        let authenticator = Authenticator::new(config.auth.clone());
        let blob = authenticator
            .login(driver, &config.target_url, credentials)
            .await?;
        store.save(&blob)?;
    }

    let navigator = WizardNavigator::new(config.plan.clone(), config.wizard.clone());
    navigator.drive(driver, sink).await?;

    sink.emit(RunEvent::Stage(RunStage::Collecting));
    let extractor = TableExtractor::new(
        config.table_selector.clone(),
        config.empty_marker.clone(),
        config.identity,
        config.extract.clone(),
    );
    let snapshot = extractor.run(driver, sink).await?;

    let mut records = Vec::with_capacity(snapshot.rows.len());
    let mut skipped = 0usize;
    for (key, raw) in &snapshot.rows {
        match normalize_row(raw, &config.schema) {
            Some(record) => records.push(record),
            None => {
                harvest_debug!("Row {} skipped by normalization", key.as_str());
                skipped += 1;
            }
        }
    }

    sink.emit(RunEvent::Stage(RunStage::Writing));
    let result = ExtractionResult {
        records,
        skipped,
        passes: snapshot.passes,
        truncated: snapshot.truncated,
        target_hint: snapshot.target_hint,
        extracted_utc: chrono::Utc::now().to_rfc3339(),
    };
    SnapshotWriter::new(config.output_path.clone()).write(&result)?;

    sink.emit(RunEvent::Stage(RunStage::Done));
    Ok(RunSummary {
        records: result.records.len(),
        skipped: result.skipped,
        passes: result.passes,
        truncated: result.truncated,
        target_hint: result.target_hint,
        session_reused,
        output_path: config.output_path.clone(),
    })
}
