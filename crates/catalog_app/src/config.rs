//! Deployment configuration: where the catalog lives and how to read it.
//!
//! Loaded from a RON file (`harvest.ron` by default, `CATALOG_CONFIG`
//! overrides the path). A missing file falls back to built-in defaults; a
//! malformed file is an error, since running against the wrong selectors
//! would silently scrape the wrong thing.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use catalog_core::{ColumnSchema, ColumnSpec, FieldKind, StepInput, StepSpec, WizardPlan};
use catalog_engine::{
    AuthSelectors, ExtractSettings, HarvestConfig, IdentityStrategy, WizardSettings,
};
use harvest_logging::harvest_info;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "CATALOG_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "harvest.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: ron::error::SpannedError,
    },
    #[error("invalid wizard plan: {0}")]
    Plan(#[from] catalog_core::PlanError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target_url: String,
    pub session_file: PathBuf,
    pub output_file: PathBuf,
    pub auth: AuthConfig,
    pub wizard: WizardConfig,
    pub table: TableConfig,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub signin_labels: Vec<String>,
    pub identifier_input: String,
    pub secret_input: String,
    pub submit: String,
    pub submit_labels: Vec<String>,
    pub error_banner: String,
    pub authenticated_marker: String,
    pub login_timeout_ms: u64,
    pub form_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub entry_labels: Vec<String>,
    pub steps: Vec<StepConfig>,
    pub step_timeout_ms: u64,
    pub option_excludes: Vec<String>,
    pub validation_banner: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub anchor: String,
    pub choose: Vec<String>,
    pub fill: Vec<FillConfig>,
    pub toggle: Vec<String>,
    pub advance: Vec<String>,
    pub completion: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FillConfig {
    pub selector: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub selector: String,
    pub empty_marker: String,
    pub identity: IdentityConfig,
    pub scroll_fraction: f64,
    pub settle_poll_ms: u64,
    pub settle_timeout_ms: u64,
    pub stall_rounds: u32,
    pub max_passes: u32,
    pub table_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub enum IdentityConfig {
    KeyColumn(usize),
    ContentHash,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
    pub field: String,
    pub column: usize,
    #[serde(default)]
    pub kind: KindConfig,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum KindConfig {
    #[default]
    Text,
    Integer,
    Number,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:3000".to_string(),
            session_file: PathBuf::from("storage_state.json"),
            output_file: PathBuf::from("products.json"),
            auth: AuthConfig::default(),
            wizard: WizardConfig::default(),
            table: TableConfig::default(),
            columns: default_columns(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signin_labels: vec!["Sign in".to_string(), "Login".to_string()],
            identifier_input: "input[type='email']".to_string(),
            secret_input: "input[type='password']".to_string(),
            submit: "button[type='submit']".to_string(),
            submit_labels: vec!["Sign in".to_string(), "Login".to_string()],
            error_banner: "[role='alert']".to_string(),
            authenticated_marker: "a[href='/logout']".to_string(),
            login_timeout_ms: 10_000,
            form_timeout_ms: 3_000,
        }
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            entry_labels: vec![
                "Launch Challenge".to_string(),
                "Start Challenge".to_string(),
            ],
            steps: default_steps(),
            step_timeout_ms: 10_000,
            option_excludes: ["next", "back", "cancel", "skip", "close", "sign"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            validation_banner: ".wizard-error".to_string(),
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            selector: "table".to_string(),
            empty_marker: ".empty-state".to_string(),
            identity: IdentityConfig::KeyColumn(0),
            scroll_fraction: 0.5,
            settle_poll_ms: 50,
            settle_timeout_ms: 2_000,
            stall_rounds: 5,
            max_passes: 5_000,
            table_timeout_ms: 5_000,
            probe_timeout_ms: 5_000,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig::KeyColumn(0)
    }
}

fn default_steps() -> Vec<StepConfig> {
    let anchor = |n: usize| format!("[data-wizard-step='{n}']");
    vec![
        StepConfig {
            anchor: anchor(1),
            choose: vec!["Local Database".to_string(), "Local DB".to_string()],
            advance: vec!["Next".to_string(), "Continue".to_string()],
            completion: anchor(2),
            ..StepConfig::default()
        },
        StepConfig {
            anchor: anchor(2),
            advance: vec!["Next".to_string(), "Continue".to_string()],
            completion: anchor(3),
            ..StepConfig::default()
        },
        StepConfig {
            anchor: anchor(3),
            advance: vec!["Next".to_string(), "Continue".to_string()],
            completion: anchor(4),
            ..StepConfig::default()
        },
        StepConfig {
            anchor: anchor(4),
            advance: vec![
                "View Products".to_string(),
                "Finish".to_string(),
                "Open".to_string(),
            ],
            completion: String::new(), // filled with the table selector below
            ..StepConfig::default()
        },
    ]
}

fn default_columns() -> Vec<ColumnConfig> {
    let column = |field: &str, index: usize, kind: KindConfig, required: bool| ColumnConfig {
        field: field.to_string(),
        column: index,
        kind,
        required,
    };
    vec![
        column("id", 0, KindConfig::Text, true),
        column("category", 1, KindConfig::Text, false),
        column("color", 2, KindConfig::Text, false),
        column("dimensions", 3, KindConfig::Text, false),
        column("price", 4, KindConfig::Number, false),
        column("product", 5, KindConfig::Text, false),
        column("score", 6, KindConfig::Number, false),
    ]
}

/// Loads the config from disk, or defaults when no file exists.
pub fn load() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    match fs::read_to_string(&path) {
        Ok(content) => {
            let config = parse(&content, &path)?;
            harvest_info!("Loaded configuration from {path}");
            Ok(config)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            harvest_info!("No config file at {path}; using defaults");
            Ok(AppConfig::default())
        }
        Err(err) => Err(ConfigError::Read { path, source: err }),
    }
}

pub fn parse(content: &str, path: &str) -> Result<AppConfig, ConfigError> {
    ron::from_str(content).map_err(|err| ConfigError::Parse {
        path: path.to_string(),
        source: err,
    })
}

impl AppConfig {
    /// Assembles the engine's run configuration, validating the wizard plan.
    pub fn to_harvest_config(&self) -> Result<HarvestConfig, ConfigError> {
        let mut steps = Vec::with_capacity(self.wizard.steps.len());
        for (position, step) in self.wizard.steps.iter().enumerate() {
            let mut inputs = Vec::new();
            if !step.choose.is_empty() {
                inputs.push(StepInput::Choose(step.choose.clone()));
            }
            for fill in &step.fill {
                inputs.push(StepInput::Fill {
                    selector: fill.selector.clone(),
                    value: fill.value.clone(),
                });
            }
            for toggle in &step.toggle {
                inputs.push(StepInput::Toggle(toggle.clone()));
            }
            let completion = if step.completion.is_empty() {
                self.table.selector.clone()
            } else {
                step.completion.clone()
            };
            steps.push(StepSpec {
                index: (position + 1) as u8,
                anchor: step.anchor.clone(),
                inputs,
                advance: step.advance.clone(),
                completion,
            });
        }
        let plan = WizardPlan::new(steps)?;

        let columns = self
            .columns
            .iter()
            .map(|c| ColumnSpec {
                field: c.field.clone(),
                column: c.column,
                kind: match c.kind {
                    KindConfig::Text => FieldKind::Text,
                    KindConfig::Integer => FieldKind::Integer,
                    KindConfig::Number => FieldKind::Number,
                },
                required: c.required,
            })
            .collect();

        Ok(HarvestConfig {
            target_url: self.target_url.clone(),
            session_path: self.session_file.clone(),
            output_path: self.output_file.clone(),
            auth: AuthSelectors {
                signin_labels: self.auth.signin_labels.clone(),
                identifier_input: self.auth.identifier_input.clone(),
                secret_input: self.auth.secret_input.clone(),
                submit: self.auth.submit.clone(),
                submit_labels: self.auth.submit_labels.clone(),
                error_banner: self.auth.error_banner.clone(),
                authenticated_marker: self.auth.authenticated_marker.clone(),
                login_timeout: Duration::from_millis(self.auth.login_timeout_ms),
                form_timeout: Duration::from_millis(self.auth.form_timeout_ms),
            },
            plan,
            wizard: WizardSettings {
                step_timeout: Duration::from_millis(self.wizard.step_timeout_ms),
                entry_labels: self.wizard.entry_labels.clone(),
                option_excludes: self.wizard.option_excludes.clone(),
                validation_banner: self.wizard.validation_banner.clone(),
            },
            table_selector: self.table.selector.clone(),
            empty_marker: self.table.empty_marker.clone(),
            identity: match self.table.identity {
                IdentityConfig::KeyColumn(column) => IdentityStrategy::KeyColumn(column),
                IdentityConfig::ContentHash => IdentityStrategy::ContentHash,
            },
            schema: ColumnSchema::new(columns),
            extract: ExtractSettings {
                scroll_fraction: self.table.scroll_fraction,
                settle_poll: Duration::from_millis(self.table.settle_poll_ms),
                settle_timeout: Duration::from_millis(self.table.settle_timeout_ms),
                stall_rounds: self.table.stall_rounds,
                max_passes: self.table.max_passes,
                table_timeout: Duration::from_millis(self.table.table_timeout_ms),
            },
            probe_timeout: Duration::from_millis(self.table.probe_timeout_ms),
        })
    }
}
