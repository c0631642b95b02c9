//! Run summary reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info};
use uuid::Uuid;

use super::dispatcher::EventDelivery;
use super::orchestrator::RunState;
use crate::domain::change::{ChangeEvent, ChangeKind};
use crate::domain::policy::RunConfig;
use crate::infrastructure::channels::DeliveryResult;
use crate::infrastructure::fetcher::FetchFailure;

/// Outcome of a single invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub config: RunConfig,
    pub state: RunState,

    // Counts
    pub catalog_size: usize,
    pub fetched: usize,
    pub fetch_failures: Vec<FetchFailure>,
    pub events_by_kind: BTreeMap<ChangeKind, usize>,
    pub approved: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed_deliveries: usize,
    pub persisted: bool,

    // Details
    pub deliveries: Vec<EventDelivery>,
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(config: &RunConfig, catalog_size: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config: config.clone(),
            state: RunState::Init,
            catalog_size,
            fetched: 0,
            fetch_failures: Vec::new(),
            events_by_kind: BTreeMap::new(),
            approved: 0,
            delivered: 0,
            skipped: 0,
            failed_deliveries: 0,
            persisted: false,
            deliveries: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_events(&mut self, events: &[ChangeEvent]) {
        for event in events {
            *self.events_by_kind.entry(event.kind).or_insert(0) += 1;
        }
    }

    /// Events detected excluding first observations
    pub fn changes_detected(&self) -> usize {
        self.events_by_kind
            .iter()
            .filter(|(kind, _)| kind.is_notifiable())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn record_deliveries(&mut self, deliveries: Vec<EventDelivery>) {
        for delivery in deliveries.iter().flat_map(|event| &event.deliveries) {
            match delivery.result {
                DeliveryResult::Delivered => self.delivered += 1,
                DeliveryResult::Skipped => self.skipped += 1,
                DeliveryResult::Failed(_) => self.failed_deliveries += 1,
            }
        }
        self.deliveries = deliveries;
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// Partial per-item failures, which do not fail the run
    pub fn partial_failures(&self) -> usize {
        self.fetch_failures.len() + self.failed_deliveries
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Emit the final summary line
    pub fn log(&self) {
        if let Some(err) = &self.error {
            error!(
                run_id = %self.run_id,
                state = ?self.state,
                error = %err,
                "Run failed"
            );
            return;
        }
        info!(
            run_id = %self.run_id,
            mode = %self.config.mode,
            catalog = self.catalog_size,
            fetched = self.fetched,
            fetch_failures = self.fetch_failures.len(),
            changes = self.changes_detected(),
            approved = self.approved,
            delivered = self.delivered,
            skipped = self.skipped,
            failed_deliveries = self.failed_deliveries,
            persisted = self.persisted,
            "Run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::ChannelDelivery;
    use crate::shared::types::Asin;

    fn delivery(asin: &str, results: Vec<DeliveryResult>) -> EventDelivery {
        EventDelivery {
            asin: asin.parse::<Asin>().unwrap(),
            kind: ChangeKind::BackInStock,
            deliveries: results
                .into_iter()
                .enumerate()
                .map(|(i, result)| ChannelDelivery {
                    channel: format!("channel-{}", i),
                    result,
                })
                .collect(),
        }
    }

    #[test]
    fn test_delivery_counts() {
        let mut summary = RunSummary::new(&RunConfig::default(), 3);
        summary.record_deliveries(vec![
            delivery("B000000001", vec![DeliveryResult::Delivered, DeliveryResult::Failed("503".into())]),
            delivery("B000000002", vec![DeliveryResult::Skipped, DeliveryResult::Skipped]),
        ]);

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed_deliveries, 1);
        assert_eq!(summary.partial_failures(), 1);
    }

    #[test]
    fn test_summary_serialization() {
        let mut summary = RunSummary::new(&RunConfig::default(), 2);
        summary.events_by_kind.insert(ChangeKind::DiscountStarted, 1);
        summary.events_by_kind.insert(ChangeKind::NoPriorData, 4);
        summary.record_deliveries(vec![delivery("B000000001", vec![DeliveryResult::Delivered])]);
        summary.finish(RunState::Done);

        assert!(summary.is_success());
        assert_eq!(summary.changes_detected(), 1);

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["config"]["mode"], "all");
        assert_eq!(json["events_by_kind"]["DiscountStarted"], 1);
        assert_eq!(json["deliveries"][0]["deliveries"][0]["outcome"], "delivered");
        assert!(json["finished_at"].is_string());
    }
}
