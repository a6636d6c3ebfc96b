//! Daily intake statistics

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use contracts::{ContractError, KvStore, PipelineStatistic, PipelineStatisticElement, StoreError};
use tracing::instrument;

use crate::clock::Clock;
use crate::keys;

/// Day-over-day change in percent
///
/// Returns 0.0 when `yesterday` is 0, which also hides growth from zero.
pub fn change_rate(today: u64, yesterday: u64) -> f64 {
    if yesterday == 0 {
        return 0.0;
    }
    (today as f64 - yesterday as f64) / yesterday as f64 * 100.0
}

/// Reads and bumps per-day intake counters
pub struct StatisticsAggregator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    window_days: u32,
}

impl<S> Clone for StatisticsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            window_days: self.window_days,
        }
    }
}

impl<S: KvStore + Sync> StatisticsAggregator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, window_days: u32) -> Self {
        Self {
            store,
            clock,
            window_days: window_days.max(1),
        }
    }

    /// Count one datapoint against today
    ///
    /// # Returns
    /// Today's intake after the increment
    pub async fn record_intake(&self, pipeline_id: &str) -> Result<u64, ContractError> {
        let key = keys::daily_intake(pipeline_id, self.clock.today());
        let value = self.store.incr_by(&key, 1).await?;
        to_count(&key, value)
    }

    /// Intake of a single day, 0 when nothing was recorded
    pub async fn intake(&self, pipeline_id: &str, date: NaiveDate) -> Result<u64, ContractError> {
        let key = keys::daily_intake(pipeline_id, date);
        let value = self.store.incr_by(&key, 0).await?;
        to_count(&key, value)
    }

    /// Today, change rate and the trailing window, most recent day first
    #[instrument(name = "pipeline_statistics", skip(self))]
    pub async fn statistics(&self, pipeline_id: &str) -> Result<PipelineStatistic, ContractError> {
        let today = self.clock.today();

        let mut statistics = Vec::with_capacity(self.window_days as usize);
        for back in 0..u64::from(self.window_days) {
            let Some(date) = today.checked_sub_days(Days::new(back)) else {
                break;
            };
            statistics.push(PipelineStatisticElement {
                date,
                intake: self.intake(pipeline_id, date).await?,
            });
        }

        let today_intake = statistics.first().map_or(0, |e| e.intake);
        let yesterday_intake = match statistics.get(1) {
            Some(element) => element.intake,
            None => match today.checked_sub_days(Days::new(1)) {
                Some(date) => self.intake(pipeline_id, date).await?,
                None => 0,
            },
        };

        Ok(PipelineStatistic {
            today: today_intake,
            change_rate: change_rate(today_intake, yesterday_intake),
            statistics,
        })
    }
}

fn to_count(key: &str, value: i64) -> Result<u64, ContractError> {
    u64::try_from(value)
        .map_err(|_| StoreError::malformed(key, format!("negative intake {value}")).into())
}
