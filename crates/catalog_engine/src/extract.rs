use std::time::Duration;

use catalog_core::{RawRow, RowKey, WindowMerge};
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};

use crate::driver::{DriverError, PageDriver};
use crate::rows::{derive_identity, IdentityStrategy};
use crate::types::{HarvestError, ProgressSink, RunEvent};

/// Tuning for the scroll-capture loop. Defaults are conservative enough for
/// slow-rendering pages while keeping the common path fast.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Fraction of the scroller viewport advanced per pass. Below 1.0 so
    /// consecutive windows overlap and no row can fall between them.
    pub scroll_fraction: f64,
    /// Poll interval while waiting for the window to settle after a scroll.
    pub settle_poll: Duration,
    /// Upper bound on one settle wait.
    pub settle_timeout: Duration,
    /// Consecutive no-progress passes before the loop concludes the table is
    /// exhausted.
    pub stall_rounds: u32,
    /// Hard cap on total passes; hitting it truncates instead of looping
    /// forever on a pathological page.
    pub max_passes: u32,
    /// Bound on the initial wait for the table anchor.
    pub table_timeout: Duration,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            scroll_fraction: 0.5,
            settle_poll: Duration::from_millis(50),
            settle_timeout: Duration::from_secs(2),
            stall_rounds: 5,
            max_passes: 5_000,
            table_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything one extraction loop produced, before normalization.
#[derive(Debug)]
pub struct TableSnapshot {
    /// Unique rows in first-seen scroll order.
    pub rows: Vec<(RowKey, RawRow)>,
    pub passes: u32,
    /// Set when the safety cap cut the loop short.
    pub truncated: bool,
    /// Total row count advertised by the page, when detectable.
    pub target_hint: Option<u64>,
}

/// Reconstructs the full row set of a virtualized table from a sequence of
/// overlapping observation windows.
///
/// The table area renders only a window of rows; scrolling unmounts rows
/// behind the window and mounts rows ahead of it. Each pass captures the
/// mounted window, merges unseen rows in first-seen order, scrolls forward by
/// a bounded increment, and waits for the view to settle. The loop stops when
/// the bottom window has been captured and adds nothing, when `stall_rounds`
/// consecutive passes yield nothing new, or at the safety cap.
pub struct TableExtractor {
    table: String,
    empty_marker: String,
    identity: IdentityStrategy,
    settings: ExtractSettings,
}

impl TableExtractor {
    pub fn new(
        table: String,
        empty_marker: String,
        identity: IdentityStrategy,
        settings: ExtractSettings,
    ) -> Self {
        Self {
            table,
            empty_marker,
            identity,
            settings,
        }
    }

    pub async fn run(
        &self,
        driver: &dyn PageDriver,
        sink: &dyn ProgressSink,
    ) -> Result<TableSnapshot, HarvestError> {
        if let Err(err) = driver
            .wait_for(&self.table, self.settings.table_timeout)
            .await
        {
            // The anchor never showing up is fine for a legitimately empty
            // view; anything else is decided after the loop.
            harvest_warn!("Table anchor not confirmed: {err}");
        }

        let target_hint = match driver.page_text().await {
            Ok(text) => parse_target_hint(&text),
            Err(_) => None,
        };
        if let Some(total) = target_hint {
            harvest_info!("Page advertises {total} total rows");
        }

        // Some virtualization libraries ignore scroll events without focus,
        // and a prior run may have left the scroller mid-list.
        if let Err(err) = driver.focus(&self.table).await {
            harvest_debug!("Table focus failed: {err}");
        }
        if let Err(err) = driver.reset_scroll(&self.table).await {
            harvest_debug!("Scroll reset failed: {err}");
        }

        let mut merge = WindowMerge::new();
        let mut passes = 0u32;
        let mut stall = 0u32;
        let mut truncated = false;
        // Set once a scroll lands on the container's maximum; the loop only
        // concludes after the window at the bottom has itself been captured.
        let mut bottomed = false;

        loop {
            if passes >= self.settings.max_passes {
                harvest_warn!(
                    "Safety cap of {} passes hit with {} rows collected; truncating",
                    self.settings.max_passes,
                    merge.len()
                );
                truncated = true;
                break;
            }
            passes += 1;

            let added = match driver.visible_rows(&self.table).await {
                Ok(capture) => merge.merge(self.keyed(capture)),
                Err(err) => {
                    // One bad capture is recoverable; the stall counter
                    // decides when to give up.
                    harvest_debug!("Capture failed on pass {passes}: {err}");
                    0
                }
            };

            if added > 0 {
                stall = 0;
                sink.emit(RunEvent::Collected {
                    rows: merge.len(),
                    passes,
                });
            } else {
                stall += 1;
            }
            if passes % 25 == 0 {
                harvest_info!("Collected {} rows after {} passes", merge.len(), passes);
            }

            if bottomed && added == 0 {
                break;
            }
            if stall >= self.settings.stall_rounds {
                break;
            }

            match driver
                .scroll_table(&self.table, self.settings.scroll_fraction)
                .await
            {
                Ok(outcome) => bottomed = outcome.at_bottom(),
                Err(DriverError::NotFound { .. }) => {
                    // No scrollable ancestor: the table is fully mounted.
                    bottomed = true;
                }
                Err(err) => {
                    harvest_debug!("Scroll failed on pass {passes}: {err}");
                }
            }

            self.settle(driver).await;
        }

        if merge.is_empty() {
            let empty_confirmed = driver.exists(&self.empty_marker).await.unwrap_or(false);
            if !empty_confirmed {
                return Err(HarvestError::EmptyUnconfirmed);
            }
            harvest_info!("Table confirmed empty");
        }

        harvest_info!(
            "Collection complete: {} unique rows after {} passes",
            merge.len(),
            passes
        );

        Ok(TableSnapshot {
            rows: merge.into_ordered_rows(),
            passes,
            truncated,
            target_hint,
        })
    }

    fn keyed(&self, capture: Vec<RawRow>) -> Vec<(RowKey, RawRow)> {
        capture
            .into_iter()
            .filter_map(|row| derive_identity(self.identity, &row).map(|key| (key, row)))
            .collect()
    }

    /// Adaptive render-stabilization wait: polls the mounted window until it
    /// stops changing between two polls, bounded by `settle_timeout`.
    async fn settle(&self, driver: &dyn PageDriver) {
        let deadline = tokio::time::Instant::now() + self.settings.settle_timeout;
        let mut last: Option<Vec<String>> = None;
        loop {
            let signature: Option<Vec<String>> = driver
                .visible_rows(&self.table)
                .await
                .ok()
                .map(|rows| rows.iter().filter_map(|r| r.cells.first().cloned()).collect());
            if signature.is_some() && signature == last {
                return;
            }
            last = signature;
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(self.settings.settle_poll).await;
        }
    }
}

/// Scans the page text for a "showing N of M" style banner and returns M.
/// Zero totals are ignored; a page mid-render may briefly advertise 0.
pub(crate) fn parse_target_hint(page_text: &str) -> Option<u64> {
    let lower = page_text.to_lowercase();
    let showing = lower.find("showing")?;
    let rest = &lower[showing..];
    let of = rest.find(" of ")?;
    let tail = rest[of + 4..].trim_start();
    let digits: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| c.is_ascii_digit())
        .collect();
    let total = digits.parse::<u64>().ok()?;
    (total > 0).then_some(total)
}
