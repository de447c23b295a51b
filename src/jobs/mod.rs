pub mod mutual_fund_nav;
pub mod schedule;
pub mod stats;
pub mod stock_prices;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::JobsConfig;
use crate::database::{PortfolioStore, StoreResult};
use crate::providers::{NavProvider, QuoteProvider};

pub use schedule::Schedule;
pub use stats::JobStats;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    StockPrices,
    MutualFundNav,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Job::StockPrices => stock_prices::JOB_NAME,
            Job::MutualFundNav => mutual_fund_nav::JOB_NAME,
        }
    }
}

/// Dependencies shared by every job run
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn PortfolioStore>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub navs: Arc<dyn NavProvider>,
}

impl JobContext {
    /// Runs one job to completion and logs its summary
    pub async fn run(&self, job: Job) -> StoreResult<JobStats> {
        info!(job = job.name(), "Starting job");
        let result = match job {
            Job::StockPrices => stock_prices::run(self.store.as_ref(), self.quotes.as_ref()).await,
            Job::MutualFundNav => mutual_fund_nav::run(self.store.as_ref(), self.navs.as_ref()).await,
        };
        match &result {
            Ok(stats) => stats.log_summary(job.name()),
            Err(e) => error!(job = job.name(), error = %e, "Job failed"),
        }
        result
    }
}

/// Fires the price jobs on their schedules until cancelled
pub struct Scheduler {
    context: JobContext,
    timezone: Tz,
    stocks: Schedule,
    navs: Schedule,
}

impl Scheduler {
    pub fn new(config: &JobsConfig, context: JobContext) -> Result<Self, JobError> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| JobError::InvalidTimezone(config.timezone.clone()))?;

        let stocks = Schedule::MarketHours {
            every_minutes: config.stock_interval_minutes,
            start_hour: config.stock_window_start_hour,
            end_hour: config.stock_window_end_hour,
        };
        let navs = match config.nav_interval_minutes {
            Some(minutes) => Schedule::Every { minutes },
            None => Schedule::Daily {
                hour: config.nav_daily_hour,
                minute: 0,
            },
        };

        Ok(Self {
            context,
            timezone,
            stocks,
            navs,
        })
    }

    /// Jobs due in the wall-clock minute containing `now`
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Job> {
        let local = now.with_timezone(&self.timezone);
        let mut jobs = Vec::new();
        if self.stocks.is_due(&local) {
            jobs.push(Job::StockPrices);
        }
        if self.navs.is_due(&local) {
            jobs.push(Job::MutualFundNav);
        }
        jobs
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            timezone = %self.timezone,
            stocks = ?self.stocks,
            navs = ?self.navs,
            "Job scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(until_next_minute(Utc::now())) => {}
            }

            for job in self.due(Utc::now()) {
                let context = self.context.clone();
                tokio::spawn(async move {
                    // Failures are already logged by JobContext::run
                    let _ = context.run(job).await;
                });
            }
        }

        info!("Job scheduler stopped");
    }
}

fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    Duration::from_secs(60).saturating_sub(into_minute)
}
