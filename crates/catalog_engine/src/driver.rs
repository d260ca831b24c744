use std::time::Duration;

use catalog_core::RawRow;

use crate::session::SessionBlob;

/// Failure inside the browser collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("element not found: {selector}")]
    NotFound { selector: String },
    #[error("timed out after {timeout:?} waiting for {selector}")]
    WaitTimeout { selector: String, timeout: Duration },
    #[error("browser error: {0}")]
    Browser(String),
}

/// Result of one scroll of the table's scrollable ancestor, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOutcome {
    pub before: f64,
    pub after: f64,
    /// Maximum reachable scroll offset (`scrollHeight - clientHeight`).
    pub max: f64,
}

impl ScrollOutcome {
    /// The container cannot scroll further forward.
    pub fn at_bottom(&self) -> bool {
        self.after >= self.max - 0.5
    }
}

/// The narrow set of browser primitives the engine consumes. Everything the
/// run does to the page goes through this trait; the production
/// implementation is [`crate::ChromiumDriver`], tests script an in-memory
/// fake.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Bounded wait for an element to be present. `WaitTimeout` on expiry.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;

    async fn read_text(&self, selector: &str) -> Result<String, DriverError>;

    /// Full rendered text of the page body.
    async fn page_text(&self) -> Result<String, DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Clicks the first visible, enabled control whose label matches any of
    /// the candidates. Returns whether anything was clicked.
    async fn click_text(&self, labels: &[String]) -> Result<bool, DriverError>;

    /// Clicks the first visible button whose label matches none of the
    /// excluded words. Fallback for wizard steps without a configured choice.
    async fn click_any_option(&self, excluded: &[String]) -> Result<bool, DriverError>;

    /// Cell texts of the rows currently mounted in the table. A virtualized
    /// table only mounts the visible window, so this is one observation
    /// window, not the full row set.
    async fn visible_rows(&self, table: &str) -> Result<Vec<RawRow>, DriverError>;

    /// Best-effort focus of the table region; some virtualization libraries
    /// ignore scroll events without focus.
    async fn focus(&self, selector: &str) -> Result<(), DriverError>;

    /// Resets the table's scrollable ancestor to the top.
    async fn reset_scroll(&self, table: &str) -> Result<(), DriverError>;

    /// Scrolls the table's scrollable ancestor forward by `fraction` of its
    /// viewport height. Fractions below 1.0 keep consecutive windows
    /// overlapping.
    async fn scroll_table(&self, table: &str, fraction: f64) -> Result<ScrollOutcome, DriverError>;

    /// Serializes the current browser state (cookies + storage).
    async fn capture_session(&self) -> Result<SessionBlob, DriverError>;

    /// Applies a previously captured state to the current browser context.
    async fn apply_session(&self, blob: &SessionBlob) -> Result<(), DriverError>;
}
