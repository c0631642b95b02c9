//! Batched product retrieval with bounded retries

use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::paapi::{GetItemsOutcome, ProductApi};
use crate::config::{MarketplaceCfg, MAX_BATCH_SIZE};
use crate::domain::product::SnapshotSet;
use crate::shared::errors::FetchError;
use crate::shared::types::Asin;

/// Fetcher tuning
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Pause between consecutive batch calls
    pub batch_interval: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            batch_interval: Duration::from_secs(3),
        }
    }
}

impl From<&MarketplaceCfg> for FetchSettings {
    fn from(cfg: &MarketplaceCfg) -> Self {
        Self {
            batch_size: cfg.batch_size.clamp(1, MAX_BATCH_SIZE),
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: cfg.backoff_base(),
            batch_interval: cfg.batch_interval(),
        }
    }
}

/// ASIN for which no data could be obtained this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub asin: Asin,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Snapshots in catalog order
    pub snapshots: SnapshotSet,
    pub failures: Vec<FetchFailure>,
}

pub struct ProductFetcher {
    api: Arc<dyn ProductApi>,
    settings: FetchSettings,
}

impl ProductFetcher {
    pub fn new(api: Arc<dyn ProductApi>, settings: FetchSettings) -> Self {
        Self { api, settings }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1) plus up to 25% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.settings.backoff_base.saturating_mul(1u32 << (attempt - 1).min(16));
        let jitter_cap = exp.as_millis() as u64 / 4;
        let jitter = if jitter_cap > 0 {
            rand::thread_rng().gen_range(0..=jitter_cap)
        } else {
            0
        };
        exp + Duration::from_millis(jitter)
    }

    async fn fetch_batch(&self, batch: &[Asin]) -> Result<GetItemsOutcome, FetchError> {
        let mut attempt = 1;
        loop {
            match self.api.get_items(batch).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch error, retrying batch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch every catalog ASIN. Per-batch and per-item failures are recorded and never
    /// raised; only the failure of every batch call is an error.
    pub async fn fetch(&self, catalog: &[Asin]) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();
        let mut fetched = SnapshotSet::new();
        let mut batches_ok = 0usize;
        let mut last_error = None;

        for (i, batch) in catalog.chunks(self.settings.batch_size).enumerate() {
            if i > 0 && !self.settings.batch_interval.is_zero() {
                tokio::time::sleep(self.settings.batch_interval).await;
            }

            match self.fetch_batch(batch).await {
                Ok(result) => {
                    batches_ok += 1;
                    for snapshot in result.snapshots {
                        fetched.insert(snapshot);
                    }
                    for missing in result.missing {
                        warn!(asin = %missing.asin, reason = %missing.reason, "No data for ASIN");
                        outcome.failures.push(FetchFailure {
                            asin: missing.asin,
                            reason: missing.reason,
                        });
                    }
                }
                Err(e) => {
                    warn!(batch = i, size = batch.len(), error = %e, "Batch fetch failed");
                    for asin in batch {
                        warn!(asin = %asin, reason = %e, "No data for ASIN");
                        outcome.failures.push(FetchFailure {
                            asin: asin.clone(),
                            reason: e.to_string(),
                        });
                    }
                    last_error = Some(e);
                }
            }
        }

        if batches_ok == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        // Re-order by catalog regardless of how the API ordered its items
        for asin in catalog {
            if let Some(snapshot) = fetched.get(asin) {
                outcome.snapshots.insert(snapshot.clone());
            }
        }

        info!(
            requested = catalog.len(),
            fetched = outcome.snapshots.len(),
            failed = outcome.failures.len(),
            "Product data fetched"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductSnapshot;
    use crate::infrastructure::paapi::MissingItem;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Scripted API: per-call failures are consumed in order, then items are served
    #[derive(Default)]
    struct FakeApi {
        calls: Mutex<Vec<Vec<Asin>>>,
        scripted_errors: Mutex<Vec<FetchError>>,
        invalid: HashSet<String>,
        fail_batches_containing: HashMap<String, FetchError>,
    }

    #[async_trait]
    impl ProductApi for FakeApi {
        async fn get_items(&self, asins: &[Asin]) -> Result<GetItemsOutcome, FetchError> {
            self.calls.lock().unwrap().push(asins.to_vec());
            if let Some(e) = self.scripted_errors.lock().unwrap().pop() {
                return Err(e);
            }
            for asin in asins {
                if let Some(e) = self.fail_batches_containing.get(asin.as_str()) {
                    return Err(e.clone());
                }
            }
            let mut outcome = GetItemsOutcome::default();
            // Serve in reverse to check catalog ordering is restored
            for asin in asins.iter().rev() {
                if self.invalid.contains(asin.as_str()) {
                    outcome.missing.push(MissingItem {
                        asin: asin.clone(),
                        reason: "ItemNotAccessible".to_string(),
                    });
                } else {
                    outcome
                        .snapshots
                        .push(ProductSnapshot::new(asin.clone(), asin.as_str(), Utc::now()));
                }
            }
            Ok(outcome)
        }
    }

    fn catalog(n: usize) -> Vec<Asin> {
        (0..n).map(|i| format!("B00000000{}", i).parse().unwrap()).collect()
    }

    fn settings(batch_size: usize) -> FetchSettings {
        FetchSettings {
            batch_size,
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            batch_interval: Duration::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_cover_whole_catalog_in_order() {
        let api = Arc::new(FakeApi::default());
        let fetcher = ProductFetcher::new(api.clone(), settings(3));
        let asins = catalog(7);

        let outcome = fetcher.fetch(&asins).await.unwrap();

        let sizes: Vec<usize> = api.calls.lock().unwrap().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let order: Vec<Asin> = outcome.snapshots.asins().cloned().collect();
        assert_eq!(order, asins);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_item_failures_are_not_retried() {
        let api = Arc::new(FakeApi {
            invalid: ["B000000002", "B000000007"].iter().map(|s| s.to_string()).collect(),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api.clone(), settings(10));

        let outcome = fetcher.fetch(&catalog(10)).await.unwrap();

        assert_eq!(api.calls.lock().unwrap().len(), 1);
        assert_eq!(outcome.snapshots.len(), 8);
        let failed: Vec<&str> = outcome.failures.iter().map(|f| f.asin.as_str()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&"B000000002"));
        assert!(failed.contains(&"B000000007"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let api = Arc::new(FakeApi {
            scripted_errors: Mutex::new(vec![FetchError::RateLimited, FetchError::Timeout("slow".into())]),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api.clone(), settings(10));

        let outcome = fetcher.fetch(&catalog(2)).await.unwrap();

        assert_eq!(api.calls.lock().unwrap().len(), 3);
        assert_eq!(outcome.snapshots.len(), 2);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_degrade_batch_to_no_data() {
        let api = Arc::new(FakeApi {
            fail_batches_containing: [("B000000000".to_string(), FetchError::RateLimited)]
                .into_iter()
                .collect(),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api.clone(), settings(2));

        let outcome = fetcher.fetch(&catalog(4)).await.unwrap();

        // first batch: 3 attempts, second batch: 1
        assert_eq!(api.calls.lock().unwrap().len(), 4);
        assert_eq!(outcome.snapshots.len(), 2);
        assert_eq!(outcome.failures.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_batch_error_is_not_retried() {
        let api = Arc::new(FakeApi {
            scripted_errors: Mutex::new(vec![FetchError::Rejected("HTTP 400".into())]),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api.clone(), settings(2));

        let outcome = fetcher.fetch(&catalog(4)).await.unwrap();
        assert_eq!(api.calls.lock().unwrap().len(), 2);
        assert_eq!(outcome.failures.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_is_an_error() {
        let api = Arc::new(FakeApi {
            fail_batches_containing: catalog(4)
                .into_iter()
                .map(|a| (a.to_string(), FetchError::Unavailable("down".into())))
                .collect(),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api, settings(2));

        let result = fetcher.fetch(&catalog(4)).await;
        assert!(matches!(result, Err(FetchError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_items_invalid_is_not_fatal() {
        let api = Arc::new(FakeApi {
            invalid: catalog(3).iter().map(|a| a.to_string()).collect(),
            ..FakeApi::default()
        });
        let fetcher = ProductFetcher::new(api, settings(10));

        let outcome = fetcher.fetch(&catalog(3)).await.unwrap();
        assert!(outcome.snapshots.is_empty());
        assert_eq!(outcome.failures.len(), 3);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let fetcher = ProductFetcher::new(Arc::new(FakeApi::default()), settings(10));
        let first = fetcher.backoff(1);
        let third = fetcher.backoff(3);
        assert!(first >= Duration::from_millis(10) && first <= Duration::from_millis(12));
        assert!(third >= Duration::from_millis(40) && third <= Duration::from_millis(50));
    }
}
