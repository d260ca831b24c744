use std::time::Duration;

use catalog_core::{StepInput, StepSpec, WizardCursor, WizardPlan};
use harvest_logging::{harvest_debug, harvest_info};

use crate::driver::{DriverError, PageDriver};
use crate::types::{ProgressSink, RunEvent, RunStage};

/// Fatal failure at a specific wizard step. The navigator never skips a step
/// to keep going.
#[derive(Debug, thiserror::Error)]
#[error("wizard step {step} failed: {reason}")]
pub struct NavigationError {
    pub step: u8,
    pub reason: String,
}

impl NavigationError {
    fn new(step: u8, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WizardSettings {
    /// Bound on every per-step wait (anchor and completion marker).
    pub step_timeout: Duration,
    /// Labels of the control that opens the wizard, clicked once before
    /// step 1. Empty when the wizard is already open.
    pub entry_labels: Vec<String>,
    /// Label words that disqualify a button from the option fallback.
    pub option_excludes: Vec<String>,
    /// Selector of a validation banner the page may surface on a bad step.
    pub validation_banner: String,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(10),
            entry_labels: Vec::new(),
            option_excludes: ["next", "back", "cancel", "skip", "close", "sign"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            validation_banner: ".wizard-error".to_string(),
        }
    }
}

/// Drives the configured step sequence to the table view. Steps run strictly
/// in order; each transition re-derives its state from the page.
pub struct WizardNavigator {
    plan: WizardPlan,
    settings: WizardSettings,
}

impl WizardNavigator {
    pub fn new(plan: WizardPlan, settings: WizardSettings) -> Self {
        Self { plan, settings }
    }

    pub async fn drive(
        &self,
        driver: &dyn PageDriver,
        sink: &dyn ProgressSink,
    ) -> Result<(), NavigationError> {
        if !self.settings.entry_labels.is_empty() {
            let entered = driver
                .click_text(&self.settings.entry_labels)
                .await
                .map_err(|e| NavigationError::new(1, e.to_string()))?;
            if entered {
                harvest_debug!("Wizard entry control clicked");
            }
        }

        let mut cursor = WizardCursor::new();
        for step in self.plan.steps() {
            sink.emit(RunEvent::Stage(RunStage::Wizard(step.index)));
            self.run_step(driver, step).await?;
            cursor
                .complete(step.index)
                .map_err(|e| NavigationError::new(step.index, e.to_string()))?;
            harvest_info!("Wizard step {} complete", step.index);
        }
        debug_assert!(cursor.is_terminal(&self.plan));
        Ok(())
    }

    async fn run_step(
        &self,
        driver: &dyn PageDriver,
        step: &StepSpec,
    ) -> Result<(), NavigationError> {
        let err = |e: DriverError| NavigationError::new(step.index, e.to_string());

        driver
            .wait_for(&step.anchor, self.settings.step_timeout)
            .await
            .map_err(|e| NavigationError::new(step.index, format!("anchor: {e}")))?;

        let mut chose = false;
        for input in &step.inputs {
            match input {
                StepInput::Choose(labels) => {
                    chose |= driver.click_text(labels).await.map_err(err)?;
                }
                StepInput::Fill { selector, value } => {
                    driver.fill(selector, value).await.map_err(err)?;
                }
                StepInput::Toggle(selector) => {
                    driver.click(selector).await.map_err(err)?;
                }
            }
        }
        if !chose && step.inputs.iter().any(|i| matches!(i, StepInput::Choose(_))) {
            // None of the configured labels matched; take the first plain
            // option on the step instead of stalling.
            chose = driver
                .click_any_option(&self.settings.option_excludes)
                .await
                .map_err(err)?;
            if chose {
                harvest_debug!("Step {}: fell back to first visible option", step.index);
            }
        }

        driver.click_text(&step.advance).await.map_err(err)?;

        self.await_completion(driver, step).await
    }

    /// Bounded wait for the step's completion marker, failing early when the
    /// page surfaces a validation banner.
    async fn await_completion(
        &self,
        driver: &dyn PageDriver,
        step: &StepSpec,
    ) -> Result<(), NavigationError> {
        let err = |e: DriverError| NavigationError::new(step.index, e.to_string());
        let deadline = tokio::time::Instant::now() + self.settings.step_timeout;
        let poll = Duration::from_millis(100);

        loop {
            if driver.exists(&step.completion).await.map_err(err)? {
                return Ok(());
            }
            if !self.settings.validation_banner.is_empty()
                && driver
                    .exists(&self.settings.validation_banner)
                    .await
                    .map_err(err)?
            {
                let text = driver
                    .read_text(&self.settings.validation_banner)
                    .await
                    .unwrap_or_default();
                return Err(NavigationError::new(
                    step.index,
                    format!("validation error: {}", text.trim()),
                ));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(NavigationError::new(
                    step.index,
                    format!(
                        "timed out after {:?} waiting for completion marker {}",
                        self.settings.step_timeout, step.completion
                    ),
                ));
            }
            tokio::time::sleep(poll).await;
        }
    }
}
