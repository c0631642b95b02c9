//! Fan-out of approved events to every configured channel

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::message::MessageFormatter;
use crate::config::DispatchCfg;
use crate::domain::change::{ChangeEvent, ChangeKind};
use crate::domain::product::SnapshotSet;
use crate::infrastructure::channels::{Channel, DeliveryResult, Message};
use crate::shared::types::Asin;
use crate::shared::utils::truncate;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Events beyond this many are skipped on every channel
    pub max_posts_per_run: usize,
    pub post_interval: Duration,
}

impl From<&DispatchCfg> for DispatchSettings {
    fn from(cfg: &DispatchCfg) -> Self {
        Self {
            max_posts_per_run: cfg.max_posts_per_run,
            post_interval: Duration::from_millis(cfg.post_interval_ms),
        }
    }
}

/// Result of one (event, channel) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDelivery {
    pub channel: String,
    #[serde(flatten)]
    pub result: DeliveryResult,
}

/// Delivery outcomes for one event across every channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDelivery {
    pub asin: Asin,
    pub kind: ChangeKind,
    pub deliveries: Vec<ChannelDelivery>,
}

impl EventDelivery {
    /// True when at least one channel accepted the post
    pub fn delivered_anywhere(&self) -> bool {
        self.deliveries.iter().any(|d| d.result.is_delivered())
    }
}

pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn Channel>>,
    formatter: MessageFormatter,
    settings: DispatchSettings,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn Channel>>, formatter: MessageFormatter, settings: DispatchSettings) -> Self {
        Self {
            channels,
            formatter,
            settings,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn message_for(&self, event: &ChangeEvent, current: &SnapshotSet) -> Message {
        self.formatter.format(event, current.get(&event.asin))
    }

    /// Messages that would be posted, without touching any channel
    pub fn preview(&self, events: &[ChangeEvent], current: &SnapshotSet) -> Vec<Message> {
        events.iter().map(|event| self.message_for(event, current)).collect()
    }

    /// Post every event on every channel. A failing channel never affects other
    /// channels or later events; nothing is retried within the run.
    pub async fn dispatch(&self, events: &[ChangeEvent], current: &SnapshotSet) -> Vec<EventDelivery> {
        let mut outcomes = Vec::with_capacity(events.len());
        let mut posted = 0usize;

        for event in events {
            if posted >= self.settings.max_posts_per_run {
                info!(asin = %event.asin, kind = ?event.kind, "Post limit reached, skipping");
                outcomes.push(EventDelivery {
                    asin: event.asin.clone(),
                    kind: event.kind,
                    deliveries: self
                        .channels
                        .iter()
                        .map(|c| ChannelDelivery {
                            channel: c.name().to_string(),
                            result: DeliveryResult::Skipped,
                        })
                        .collect(),
                });
                continue;
            }

            if posted > 0 && !self.settings.post_interval.is_zero() {
                tokio::time::sleep(self.settings.post_interval).await;
            }
            posted += 1;

            let message = self.message_for(event, current);
            info!(
                asin = %event.asin,
                kind = ?event.kind,
                preview = %truncate(message.text.lines().next().unwrap_or_default(), 40),
                "Posting notification"
            );

            let results = join_all(self.channels.iter().map(|channel| {
                let message = &message;
                async move {
                    let result = channel.post(message).await;
                    ChannelDelivery {
                        channel: channel.name().to_string(),
                        result,
                    }
                }
            }))
            .await;

            for delivery in &results {
                match &delivery.result {
                    DeliveryResult::Failed(reason) => warn!(
                        asin = %event.asin,
                        channel = %delivery.channel,
                        reason = %reason,
                        "Delivery failed"
                    ),
                    result => info!(
                        asin = %event.asin,
                        channel = %delivery.channel,
                        outcome = %result,
                        "Delivery outcome"
                    ),
                }
            }

            outcomes.push(EventDelivery {
                asin: event.asin.clone(),
                kind: event.kind,
                deliveries: results,
            });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::classify;
    use crate::domain::product::{ProductSnapshot, StockStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingChannel {
        name: &'static str,
        fail: bool,
        posts: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                posts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn post(&self, message: &Message) -> DeliveryResult {
            self.posts.lock().unwrap().push(message.text.clone());
            if self.fail {
                DeliveryResult::Failed("HTTP 503".to_string())
            } else {
                DeliveryResult::Delivered
            }
        }
    }

    fn back_in_stock(asins: &[&str]) -> (Vec<ChangeEvent>, SnapshotSet) {
        let mut events = Vec::new();
        let mut current = SnapshotSet::new();
        for asin in asins {
            let mut before = ProductSnapshot::new(asin.parse().unwrap(), *asin, Utc::now());
            before.in_stock = StockStatus::Unavailable;
            let mut after = before.clone();
            after.in_stock = StockStatus::Available;
            events.push(classify(Some(&before), &after).unwrap());
            current.insert(after);
        }
        (events, current)
    }

    fn dispatcher(channels: Vec<Arc<dyn Channel>>, max_posts_per_run: usize) -> NotificationDispatcher {
        NotificationDispatcher::new(
            channels,
            MessageFormatter::new("www.amazon.co.jp", "tracker-22", Vec::new()),
            DispatchSettings {
                max_posts_per_run,
                post_interval: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_failures_are_isolated() {
        let ok = RecordingChannel::new("webhook", false);
        let broken = RecordingChannel::new("threads", true);
        let d = dispatcher(vec![broken.clone(), ok.clone()], 10);
        let (events, current) = back_in_stock(&["B000000001", "B000000002"]);

        let outcomes = d.dispatch(&events, &current).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(ok.posts.lock().unwrap().len(), 2);
        assert_eq!(broken.posts.lock().unwrap().len(), 2);
        for outcome in &outcomes {
            assert!(outcome.delivered_anywhere());
            assert_eq!(outcome.deliveries[0].channel, "threads");
            assert!(matches!(outcome.deliveries[0].result, DeliveryResult::Failed(_)));
            assert_eq!(outcome.deliveries[1].result, DeliveryResult::Delivered);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_cap_skips_remaining_events() {
        let channel = RecordingChannel::new("webhook", false);
        let d = dispatcher(vec![channel.clone()], 1);
        let (events, current) = back_in_stock(&["B000000001", "B000000002", "B000000003"]);

        let outcomes = d.dispatch(&events, &current).await;

        assert_eq!(channel.posts.lock().unwrap().len(), 1);
        assert!(outcomes[0].delivered_anywhere());
        for outcome in &outcomes[1..] {
            assert!(!outcome.delivered_anywhere());
            assert_eq!(outcome.deliveries[0].result, DeliveryResult::Skipped);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_posts_are_spaced_by_interval() {
        let channel = RecordingChannel::new("webhook", false);
        let d = dispatcher(vec![channel], 10);
        let (events, current) = back_in_stock(&["B000000001", "B000000002", "B000000003"]);

        let start = tokio::time::Instant::now();
        d.dispatch(&events, &current).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[test]
    fn test_preview_formats_without_posting() {
        let channel = RecordingChannel::new("webhook", false);
        let d = dispatcher(vec![channel.clone()], 10);
        let (events, current) = back_in_stock(&["B000000001"]);

        let messages = d.preview(&events, &current);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.contains("B000000001"));
        assert!(channel.posts.lock().unwrap().is_empty());
    }
}
