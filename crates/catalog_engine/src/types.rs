use crate::auth::AuthError;
use crate::driver::DriverError;
use crate::persist::PersistError;
use crate::wizard::NavigationError;

/// Phase of a run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Loading and probing a stored session.
    Session,
    /// Interactive credential login.
    Login,
    /// Driving the configured wizard step.
    Wizard(u8),
    /// Scrolling the virtualized table and merging captures.
    Collecting,
    /// Serializing the snapshot to disk.
    Writing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Stage(RunStage),
    /// Emitted as the accumulated row set grows during collection.
    Collected { rows: usize, passes: u32 },
}

/// Receives run progress; the caller decides presentation.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Forwards events over a channel, for callers that consume progress on
/// another thread.
pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<RunEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

/// Fatal failure of a run. Session-probe failures and individual scroll-pass
/// timeouts are recovered locally and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("no rows extracted and the table's empty state could not be confirmed")]
    EmptyUnconfirmed,
    #[error("failed to persist output: {0}")]
    Write(#[from] PersistError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("invalid wizard plan: {0}")]
    Plan(#[from] catalog_core::PlanError),
}
