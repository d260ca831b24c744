//! Catalog engine: browser-driven extraction pipeline.
mod auth;
mod chromium;
mod driver;
mod engine;
mod export;
mod extract;
mod persist;
mod rows;
mod session;
mod types;
mod wizard;

pub use auth::{AuthError, AuthSelectors, Authenticator, Credentials};
pub use chromium::{ChromiumDriver, ChromiumSettings};
pub use driver::{DriverError, PageDriver, ScrollOutcome};
pub use engine::{run_harvest, HarvestConfig, RunSummary};
pub use export::{build_snapshot_document, ExtractionResult, SnapshotWriter};
pub use extract::{ExtractSettings, TableExtractor, TableSnapshot};
pub use persist::{ensure_parent_dir, AtomicFileWriter, PersistError};
pub use rows::{derive_identity, parse_table_rows, IdentityStrategy};
pub use session::{SessionBlob, SessionStore, StoredCookie};
pub use types::{
    ChannelProgressSink, HarvestError, ProgressSink, RunEvent, RunStage,
};
pub use wizard::{NavigationError, WizardNavigator, WizardSettings};
