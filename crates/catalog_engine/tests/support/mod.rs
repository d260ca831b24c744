//! Scripted in-memory page fake shared by the engine tests.
//!
//! Models the target application the way the engine sees it: a login
//! surface, a four-step wizard, and a virtualized table that only mounts a
//! window of rows around the current scroll offset.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use catalog_core::{
    ColumnSchema, ColumnSpec, FieldKind, RawRow, StepInput, StepSpec, WizardPlan,
};
use catalog_engine::{
    AuthSelectors, DriverError, ExtractSettings, HarvestConfig, IdentityStrategy, PageDriver,
    ScrollOutcome, SessionBlob, StoredCookie, WizardSettings,
};

/// Height of one mounted row in fake pixels.
pub const ROW_PX: f64 = 10.0;

pub const TABLE_SEL: &str = "table.products";
pub const EMPTY_SEL: &str = ".empty-state";
pub const AUTHED_SEL: &str = "#account-menu";
pub const EMAIL_SEL: &str = "input[type='email']";
pub const PASSWORD_SEL: &str = "input[type='password']";
pub const SUBMIT_SEL: &str = "button[type='submit']";
pub const BANNER_SEL: &str = ".alert-error";
pub const WIZARD_BANNER_SEL: &str = ".wizard-error";

/// Wizard position: 0 = not entered, 1..=4 = active step, 5 = table view.
pub const TABLE_VIEW: u8 = 5;

#[derive(Debug, Default)]
pub struct FakeState {
    pub logged_in: bool,
    pub login_form_visible: bool,
    /// Credentials the fake application accepts; `None` rejects everything.
    pub accepted: Option<(String, String)>,
    /// Rejected submissions hang without a banner instead of surfacing one.
    pub silent_login_failure: bool,
    pub banner: Option<String>,
    pub login_attempts: u32,

    pub wizard_step: u8,
    /// Step whose advance raises a validation banner instead of advancing.
    pub failing_step: Option<u8>,
    pub wizard_banner: Option<String>,

    pub rows: Vec<RawRow>,
    /// Rows mounted at once.
    pub window: usize,
    pub scroll_top: f64,
    /// Reported scroller maximum override, to model a bottom that is never
    /// observed (e.g. an ever-growing scrollHeight).
    pub reported_max: Option<f64>,
    pub empty_state: bool,
    pub page_banner: Option<String>,

    /// Cookie value that authenticates when applied via a session blob.
    pub valid_token: Option<String>,
    /// Cookie value handed out by `capture_session`.
    pub issued_token: String,

    pub filled: HashMap<String, String>,
    /// Ordered trace of notable interactions, for ordering assertions.
    pub events: Vec<String>,
}

pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A driver already authenticated and parked on the table view.
    pub fn at_table(rows: Vec<RawRow>, window: usize) -> Self {
        Self::new(FakeState {
            logged_in: true,
            wizard_step: TABLE_VIEW,
            rows,
            window,
            ..FakeState::default()
        })
    }

    /// A driver for the full pipeline: logged out, wizard not entered.
    pub fn fresh(rows: Vec<RawRow>, window: usize) -> Self {
        Self::new(FakeState {
            accepted: Some(("buyer@example.com".into(), "hunter2".into())),
            issued_token: "tok-fresh".into(),
            valid_token: Some("tok-fresh".into()),
            rows,
            window,
            ..FakeState::default()
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn viewport(state: &FakeState) -> f64 {
        state.window as f64 * ROW_PX
    }

    fn scroll_max(state: &FakeState) -> f64 {
        if let Some(max) = state.reported_max {
            return max;
        }
        (state.rows.len() as f64 * ROW_PX - Self::viewport(state)).max(0.0)
    }

    fn selector_present(state: &FakeState, selector: &str) -> bool {
        match selector {
            AUTHED_SEL => state.logged_in,
            EMAIL_SEL | PASSWORD_SEL | SUBMIT_SEL => state.login_form_visible && !state.logged_in,
            BANNER_SEL => state.banner.is_some(),
            WIZARD_BANNER_SEL => state.wizard_banner.is_some(),
            TABLE_SEL => state.logged_in && state.wizard_step >= TABLE_VIEW,
            EMPTY_SEL => {
                state.logged_in && state.wizard_step >= TABLE_VIEW && state.empty_state
            }
            _ => {
                if let Some(step) = parse_step_selector(selector) {
                    state.logged_in && state.wizard_step == step
                } else {
                    false
                }
            }
        }
    }

    fn advance_wizard(state: &mut FakeState) {
        if state.failing_step == Some(state.wizard_step) {
            state.wizard_banner = Some(format!(
                "Step {} is missing a required selection",
                state.wizard_step
            ));
            return;
        }
        state.events.push(format!("advance:{}", state.wizard_step));
        state.wizard_step += 1;
    }
}

fn parse_step_selector(selector: &str) -> Option<u8> {
    selector
        .strip_prefix("[data-step='")?
        .strip_suffix("']")?
        .parse()
        .ok()
}

#[async_trait::async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.events.push(format!("navigate:{url}"));
        if url.ends_with("/login") {
            state.login_form_visible = true;
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        // State changes synchronously, so presence is decided immediately.
        if Self::selector_present(&self.state(), selector) {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(Self::selector_present(&self.state(), selector))
    }

    async fn read_text(&self, selector: &str) -> Result<String, DriverError> {
        let state = self.state();
        match selector {
            BANNER_SEL => state.banner.clone(),
            WIZARD_BANNER_SEL => state.wizard_banner.clone(),
            _ => None,
        }
        .ok_or_else(|| DriverError::NotFound {
            selector: selector.to_string(),
        })
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        Ok(self.state().page_banner.clone().unwrap_or_default())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.filled.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        if selector == SUBMIT_SEL {
            if !state.login_form_visible || state.logged_in {
                return Err(DriverError::NotFound {
                    selector: selector.to_string(),
                });
            }
            state.login_attempts += 1;
            state.events.push("login-submit".to_string());
            let submitted = (
                state.filled.get(EMAIL_SEL).cloned().unwrap_or_default(),
                state.filled.get(PASSWORD_SEL).cloned().unwrap_or_default(),
            );
            if state.accepted.as_ref() == Some(&submitted) {
                state.logged_in = true;
                state.login_form_visible = false;
                state.banner = None;
            } else if !state.silent_login_failure {
                state.banner = Some("Invalid email or password".to_string());
            }
            return Ok(());
        }
        state.events.push(format!("click:{selector}"));
        Ok(())
    }

    async fn click_text(&self, labels: &[String]) -> Result<bool, DriverError> {
        let mut state = self.state();
        for label in labels {
            let label = label.to_lowercase();
            if label == "sign in" && !state.logged_in {
                state.login_form_visible = true;
                state.events.push("open-login".to_string());
                return Ok(true);
            }
            if label == "launch challenge" && state.logged_in && state.wizard_step == 0 {
                state.events.push("enter-wizard".to_string());
                state.wizard_step = 1;
                return Ok(true);
            }
            if label == "local database"
                && state.logged_in
                && (1..TABLE_VIEW).contains(&state.wizard_step)
            {
                let step = state.wizard_step;
                state.events.push(format!("choose:{}", step));
                return Ok(true);
            }
            if (label == "next" || label == "continue" || label == "view products")
                && state.logged_in
                && (1..TABLE_VIEW).contains(&state.wizard_step)
            {
                Self::advance_wizard(&mut state);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn click_any_option(&self, _excluded: &[String]) -> Result<bool, DriverError> {
        let mut state = self.state();
        if state.logged_in && (1..TABLE_VIEW).contains(&state.wizard_step) {
            let step = state.wizard_step;
            state.events.push(format!("option:{}", step));
            return Ok(true);
        }
        Ok(false)
    }

    async fn visible_rows(&self, table: &str) -> Result<Vec<RawRow>, DriverError> {
        let state = self.state();
        if state.wizard_step < TABLE_VIEW {
            return Err(DriverError::NotFound {
                selector: table.to_string(),
            });
        }
        let start = (state.scroll_top / ROW_PX).floor() as usize;
        let end = (start + state.window).min(state.rows.len());
        Ok(state.rows.get(start..end).unwrap_or_default().to_vec())
    }

    async fn focus(&self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn reset_scroll(&self, _table: &str) -> Result<(), DriverError> {
        self.state().scroll_top = 0.0;
        Ok(())
    }

    async fn scroll_table(&self, table: &str, fraction: f64) -> Result<ScrollOutcome, DriverError> {
        let mut state = self.state();
        if state.wizard_step < TABLE_VIEW {
            return Err(DriverError::NotFound {
                selector: table.to_string(),
            });
        }
        let max = Self::scroll_max(&state);
        if max <= 0.0 {
            // Everything fits in the viewport: no scrollable ancestor.
            return Err(DriverError::NotFound {
                selector: table.to_string(),
            });
        }
        let before = state.scroll_top;
        let after = (before + Self::viewport(&state) * fraction).min(max);
        state.scroll_top = after;
        Ok(ScrollOutcome { before, after, max })
    }

    async fn capture_session(&self) -> Result<SessionBlob, DriverError> {
        let state = self.state();
        Ok(SessionBlob {
            origin: "https://shop.example.com".to_string(),
            captured_utc: "2026-01-01T00:00:00+00:00".to_string(),
            cookies: vec![StoredCookie {
                name: "sid".to_string(),
                value: state.issued_token.clone(),
                domain: "shop.example.com".to_string(),
                path: "/".to_string(),
                secure: true,
                http_only: true,
            }],
            local_storage: Vec::new(),
        })
    }

    async fn apply_session(&self, blob: &SessionBlob) -> Result<(), DriverError> {
        let mut state = self.state();
        state.events.push("apply-session".to_string());
        state.logged_in = blob
            .cookies
            .iter()
            .any(|c| Some(&c.value) == state.valid_token.as_ref());
        Ok(())
    }
}

/// Backing rows shaped like the product table: ID, name, price.
pub fn product_rows(count: usize) -> Vec<RawRow> {
    (0..count)
        .map(|i| {
            RawRow::new(vec![
                format!("P-{i:04}"),
                format!("Product {i}"),
                format!("${}.99", 10 + i),
            ])
        })
        .collect()
}

pub fn test_plan() -> WizardPlan {
    let step = |index: u8| {
        let completion = if index == 4 {
            TABLE_SEL.to_string()
        } else {
            format!("[data-step='{}']", index + 1)
        };
        let advance = if index == 4 {
            vec!["View Products".to_string()]
        } else {
            vec!["Next".to_string()]
        };
        let inputs = if index == 1 {
            vec![StepInput::Choose(vec!["Local Database".to_string()])]
        } else {
            vec![StepInput::Choose(vec!["No Such Option".to_string()])]
        };
        StepSpec {
            index,
            anchor: format!("[data-step='{index}']"),
            inputs,
            advance,
            completion,
        }
    };
    WizardPlan::new(vec![step(1), step(2), step(3), step(4)]).unwrap()
}

pub fn test_schema() -> ColumnSchema {
    ColumnSchema::new(vec![
        ColumnSpec {
            field: "id".to_string(),
            column: 0,
            kind: FieldKind::Text,
            required: true,
        },
        ColumnSpec {
            field: "product".to_string(),
            column: 1,
            kind: FieldKind::Text,
            required: false,
        },
        ColumnSpec {
            field: "price".to_string(),
            column: 2,
            kind: FieldKind::Number,
            required: true,
        },
    ])
}

/// Run configuration with timeouts tuned down for tests.
pub fn test_config(dir: &Path) -> HarvestConfig {
    HarvestConfig {
        target_url: "https://shop.example.com/catalog".to_string(),
        session_path: dir.join("session.json"),
        output_path: dir.join("products.json"),
        auth: AuthSelectors {
            signin_labels: vec!["Sign in".to_string()],
            identifier_input: EMAIL_SEL.to_string(),
            secret_input: PASSWORD_SEL.to_string(),
            submit: SUBMIT_SEL.to_string(),
            submit_labels: vec!["Sign in".to_string()],
            error_banner: BANNER_SEL.to_string(),
            authenticated_marker: AUTHED_SEL.to_string(),
            login_timeout: Duration::from_millis(300),
            form_timeout: Duration::from_millis(100),
        },
        plan: test_plan(),
        wizard: WizardSettings {
            step_timeout: Duration::from_millis(200),
            entry_labels: vec!["Launch Challenge".to_string()],
            validation_banner: WIZARD_BANNER_SEL.to_string(),
            ..WizardSettings::default()
        },
        table_selector: TABLE_SEL.to_string(),
        empty_marker: EMPTY_SEL.to_string(),
        identity: IdentityStrategy::KeyColumn(0),
        schema: test_schema(),
        extract: ExtractSettings {
            settle_poll: Duration::from_millis(2),
            settle_timeout: Duration::from_millis(10),
            table_timeout: Duration::from_millis(100),
            ..ExtractSettings::default()
        },
        probe_timeout: Duration::from_millis(100),
    }
}

/// Sink that swallows progress events.
pub struct NullSink;

impl catalog_engine::ProgressSink for NullSink {
    fn emit(&self, _event: catalog_engine::RunEvent) {}
}
