//! Run mode and notification filtering

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::change::{ChangeEvent, ChangeKind};
use super::product::SnapshotSet;

/// Active run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    All,
    DiscountOnly,
    StockOnly,
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }

    fn retains(&self, kind: ChangeKind) -> bool {
        match self {
            RunMode::DiscountOnly => kind.is_discount(),
            RunMode::StockOnly => kind.is_stock(),
            RunMode::All | RunMode::DryRun => kind.is_notifiable(),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunMode::All => "all",
            RunMode::DiscountOnly => "discount-only",
            RunMode::StockOnly => "stock-only",
            RunMode::DryRun => "dry-run",
        };
        f.write_str(label)
    }
}

/// Immutable per-invocation configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub amazon_only: bool,
    /// Minimum discount for `DiscountStarted` / `DiscountChanged` to be announced
    pub min_discount_percent: u8,
}

/// Decides which detected events become notifications
pub struct NotificationPolicy<'a> {
    config: &'a RunConfig,
}

impl<'a> NotificationPolicy<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Keep the events eligible for delivery, preserving input order.
    /// `current` supplies the seller information for the Amazon-only filter.
    pub fn filter(&self, events: &[ChangeEvent], current: &SnapshotSet) -> Vec<ChangeEvent> {
        events
            .iter()
            .filter(|event| self.approves(event, current))
            .cloned()
            .collect()
    }

    /// Compares the unrounded discount, so 14.6% does not pass a 15% threshold
    fn below_threshold(&self, event: &ChangeEvent, current: &SnapshotSet) -> bool {
        let discount = current
            .get(&event.asin)
            .map(|snapshot| snapshot.raw_discount_percent())
            .unwrap_or_else(|| Decimal::from(event.discount_percent));
        discount < Decimal::from(self.config.min_discount_percent)
    }

    fn approves(&self, event: &ChangeEvent, current: &SnapshotSet) -> bool {
        if !self.config.mode.retains(event.kind) {
            return false;
        }

        if matches!(event.kind, ChangeKind::DiscountStarted | ChangeKind::DiscountChanged)
            && self.below_threshold(event, current)
        {
            debug!(
                asin = %event.asin,
                discount_percent = event.discount_percent,
                min_discount_percent = self.config.min_discount_percent,
                "Discount below threshold"
            );
            return false;
        }

        if self.config.amazon_only {
            let sold_by_amazon = current
                .get(&event.asin)
                .and_then(|snapshot| snapshot.sold_by_amazon)
                .unwrap_or(false);
            if !sold_by_amazon {
                debug!(asin = %event.asin, "Not sold by Amazon, skipping");
                return false;
            }
        }

        true
    }
}
