//! One detection run: load, fetch, diff, filter, dispatch, persist

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::dispatcher::{EventDelivery, NotificationDispatcher};
use super::report::RunSummary;
use crate::domain::change::{detect_changes, ChangeKind};
use crate::domain::policy::{NotificationPolicy, RunConfig};
use crate::domain::product::SnapshotSet;
use crate::infrastructure::catalog::Catalog;
use crate::infrastructure::fetcher::{FetchFailure, ProductFetcher};
use crate::infrastructure::state_store::StateStore;
use crate::shared::errors::{CatalogError, ConfigError, TrackerError};
use crate::shared::types::Asin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    CatalogLoaded,
    DataFetched,
    Diffed,
    Filtered,
    Dispatched,
    Persisted,
    Done,
    Failed,
}

/// Baseline to persist after a run.
///
/// Starts from `current`. ASINs that could not be fetched keep their previous entry, and
/// ASINs whose approved event reached no channel keep their previous entry so the change
/// is detected again next run.
pub fn merge_baseline(
    previous: &SnapshotSet,
    current: &SnapshotSet,
    failures: &[FetchFailure],
    deliveries: &[EventDelivery],
) -> SnapshotSet {
    let mut baseline = current.clone();

    let undelivered: HashSet<&Asin> = deliveries
        .iter()
        .filter(|d| !d.delivered_anywhere())
        .map(|d| &d.asin)
        .collect();
    for asin in undelivered {
        if let Some(snapshot) = previous.get(asin) {
            debug!(asin = %asin, "Undelivered change, keeping previous baseline entry");
            baseline.insert(snapshot.clone());
        }
    }

    for failure in failures {
        if baseline.contains(&failure.asin) {
            continue;
        }
        if let Some(snapshot) = previous.get(&failure.asin) {
            baseline.insert(snapshot.clone());
        }
    }

    baseline
}

pub struct RunOrchestrator {
    fetcher: ProductFetcher,
    store: Arc<dyn StateStore>,
    dispatcher: NotificationDispatcher,
    config: RunConfig,
    state: RunState,
}

impl RunOrchestrator {
    pub fn new(
        fetcher: ProductFetcher,
        store: Arc<dyn StateStore>,
        dispatcher: NotificationDispatcher,
        config: RunConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            dispatcher,
            config,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }

    /// Execute one run. Never returns an error: fatal problems end in `RunState::Failed`
    /// and are reported through the summary.
    pub async fn run(&mut self, catalog: &Catalog) -> RunSummary {
        self.state = RunState::Init;
        let mut summary = RunSummary::new(&self.config, catalog.len());
        info!(
            run_id = %summary.run_id,
            mode = %self.config.mode,
            amazon_only = self.config.amazon_only,
            min_discount_percent = self.config.min_discount_percent,
            catalog = catalog.len(),
            "Starting run"
        );

        match self.execute(catalog, &mut summary).await {
            Ok(()) => self.transition(RunState::Done),
            Err(e) => {
                summary.error = Some(e.to_string());
                self.transition(RunState::Failed);
            }
        }

        summary.finish(self.state);
        summary.log();
        summary
    }

    async fn execute(&mut self, catalog: &Catalog, summary: &mut RunSummary) -> Result<(), TrackerError> {
        if catalog.is_empty() {
            return Err(CatalogError::Empty.into());
        }
        if !self.config.mode.is_dry_run() && self.dispatcher.channel_count() == 0 {
            return Err(ConfigError::Invalid("no notification channel is configured".to_string()).into());
        }
        self.transition(RunState::CatalogLoaded);

        let previous = self.store.load()?;

        let fetched = self
            .fetcher
            .fetch(&catalog.asins)
            .await
            .map_err(TrackerError::FetchUnavailable)?;
        summary.fetched = fetched.snapshots.len();
        summary.fetch_failures = fetched.failures.clone();
        self.transition(RunState::DataFetched);

        let events = detect_changes(&previous, &fetched.snapshots);
        for event in &events {
            if event.kind == ChangeKind::NoPriorData {
                debug!(asin = %event.asin, "First observation");
                continue;
            }
            info!(
                asin = %event.asin,
                kind = ?event.kind,
                discount_percent = event.discount_percent,
                previous_discount_percent = event.previous_discount_percent,
                stock = ?event.in_stock_current,
                "Change detected"
            );
        }
        summary.record_events(&events);
        self.transition(RunState::Diffed);

        let approved = NotificationPolicy::new(&self.config).filter(&events, &fetched.snapshots);
        summary.approved = approved.len();
        info!(
            detected = summary.changes_detected(),
            approved = approved.len(),
            "Notification policy applied"
        );
        self.transition(RunState::Filtered);

        if self.config.mode.is_dry_run() {
            let messages = self.dispatcher.preview(&approved, &fetched.snapshots);
            for (event, message) in approved.iter().zip(&messages) {
                info!(
                    asin = %event.asin,
                    kind = ?event.kind,
                    text = %message.text,
                    "Dry run, notification not posted"
                );
            }
            self.transition(RunState::Dispatched);
            info!("Dry run, baseline not persisted");
            return Ok(());
        }

        let deliveries = self.dispatcher.dispatch(&approved, &fetched.snapshots).await;
        self.transition(RunState::Dispatched);

        let baseline = merge_baseline(&previous, &fetched.snapshots, &fetched.failures, &deliveries);
        summary.record_deliveries(deliveries);
        self.store.save(&baseline)?;
        summary.persisted = true;
        self.transition(RunState::Persisted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::ChannelDelivery;
    use crate::domain::product::ProductSnapshot;
    use crate::infrastructure::channels::DeliveryResult;
    use chrono::Utc;

    fn snapshot(asin: &str, title: &str) -> ProductSnapshot {
        ProductSnapshot::new(asin.parse().unwrap(), title, Utc::now())
    }

    fn delivery(asin: &str, result: DeliveryResult) -> EventDelivery {
        EventDelivery {
            asin: asin.parse().unwrap(),
            kind: ChangeKind::BackInStock,
            deliveries: vec![ChannelDelivery {
                channel: "webhook".to_string(),
                result,
            }],
        }
    }

    #[test]
    fn test_merge_keeps_entries_for_failed_fetches() {
        let previous: SnapshotSet = vec![snapshot("B000000001", "old"), snapshot("B000000002", "old")]
            .into_iter()
            .collect();
        let current: SnapshotSet = vec![snapshot("B000000001", "new")].into_iter().collect();
        let failures = vec![FetchFailure {
            asin: "B000000002".parse().unwrap(),
            reason: "ItemNotAccessible".to_string(),
        }];

        let baseline = merge_baseline(&previous, &current, &failures, &[]);

        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline.get(&"B000000001".parse().unwrap()).unwrap().title, "new");
        assert_eq!(baseline.get(&"B000000002".parse().unwrap()).unwrap().title, "old");
    }

    #[test]
    fn test_merge_holds_back_undelivered_changes() {
        let previous: SnapshotSet = vec![snapshot("B000000001", "old"), snapshot("B000000002", "old")]
            .into_iter()
            .collect();
        let current: SnapshotSet = vec![snapshot("B000000001", "new"), snapshot("B000000002", "new")]
            .into_iter()
            .collect();
        let deliveries = vec![
            delivery("B000000001", DeliveryResult::Failed("HTTP 500".into())),
            delivery("B000000002", DeliveryResult::Delivered),
        ];

        let baseline = merge_baseline(&previous, &current, &[], &deliveries);

        assert_eq!(baseline.get(&"B000000001".parse().unwrap()).unwrap().title, "old");
        assert_eq!(baseline.get(&"B000000002".parse().unwrap()).unwrap().title, "new");
        // order follows the current run
        let order: Vec<&str> = baseline.asins().map(|a| a.as_str()).collect();
        assert_eq!(order, vec!["B000000001", "B000000002"]);
    }

    #[test]
    fn test_merge_drops_unknown_failures() {
        let previous = SnapshotSet::new();
        let current: SnapshotSet = vec![snapshot("B000000001", "new")].into_iter().collect();
        let failures = vec![FetchFailure {
            asin: "B000000009".parse().unwrap(),
            reason: "timeout".to_string(),
        }];
        assert_eq!(merge_baseline(&previous, &current, &failures, &[]).len(), 1);
    }
}
