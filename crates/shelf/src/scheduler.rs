//! Periodic rescrape of preprints.
//!
//! Papers imported as preprints (an arXiv upload, an OpenReview submission, or no venue at all)
//! often get published later. The [`RescrapeScheduler`] periodically runs those records through
//! the scraper again and persists whatever changed.
//!
//! A cycle only runs when all of these hold:
//!
//! - no other cycle is running,
//! - the `allow_routine_rescrape` preference is on,
//! - the last completed cycle is at least `period - tolerance` old.
//!
//! The last completion time is stored in the `last_rematch_time` preference, so the schedule
//! survives restarts.

use std::{
  sync::atomic::{AtomicBool, Ordering},
  time::Duration,
};

use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};

use super::*;
use crate::{
  pipeline::UpdatePipeline,
  preference::{PreferenceKey, PreferenceValue, Preferences},
  scrape::{ScrapePayload, Scraper},
};

/// Default time between cycles.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default slack subtracted from the period when deciding whether a cycle is due.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(24 * 60 * 60);

/// Default upper bound on one cycle.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Venue markers of records that may have been published since import.
pub const PREPRINT_INDICATORS: [&str; 6] =
  ["arXiv", "openreview", "bioRxiv", "medRxiv", "SSRN", "Preprint"];

/// What a call to [`RescrapeScheduler::fire`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescrapeOutcome {
  /// Another cycle was in flight
  AlreadyRunning,
  /// Routine rescrape is switched off
  Disabled,
  /// The last cycle is too recent
  TooSoon,
  /// The cycle ran and persisted `count` records
  Completed {
    /// Records persisted by the cycle
    count: usize,
  },
  /// The cycle exceeded its timeout and was abandoned
  TimedOut,
  /// The cycle could not load its candidates or read its settings
  Failed(String),
}

/// Clears the in-flight flag when a cycle ends, including when its future is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

/// Periodic rescrape of preprint records.
pub struct RescrapeScheduler {
  /// Persists rescraped drafts
  pipeline:    Arc<UpdatePipeline>,
  /// Source of candidate records
  store:       Arc<dyn RecordStore>,
  /// Refreshes candidate metadata
  scraper:     Arc<dyn Scraper>,
  /// Schedule state and switches
  preferences: Arc<dyn Preferences>,
  /// Bus to wait for the store on and report cycles to
  bus:         EventBus,
  /// Time between cycles
  period:      Duration,
  /// Slack on the period
  tolerance:   Duration,
  /// Upper bound on one cycle
  timeout:     Duration,
  /// Set while a cycle is in flight
  running:     AtomicBool,
}

impl RescrapeScheduler {
  /// Creates a scheduler with the default period, tolerance and timeout.
  pub fn new(
    pipeline: Arc<UpdatePipeline>,
    store: Arc<dyn RecordStore>,
    scraper: Arc<dyn Scraper>,
    preferences: Arc<dyn Preferences>,
    bus: EventBus,
  ) -> Self {
    Self {
      pipeline,
      store,
      scraper,
      preferences,
      bus,
      period: DEFAULT_PERIOD,
      tolerance: DEFAULT_TOLERANCE,
      timeout: DEFAULT_TIMEOUT,
      running: AtomicBool::new(false),
    }
  }

  /// Sets the time between cycles.
  pub fn with_period(mut self, period: Duration) -> Self {
    self.period = period;
    self
  }

  /// Sets the slack on the period.
  pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
    self.tolerance = tolerance;
    self
  }

  /// Sets the upper bound on one cycle.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Starts the periodic task.
  ///
  /// The task waits until the record store is ready, then fires once per period. It does not
  /// fire immediately; the first cycle comes one period after the store became ready.
  pub fn arm(self: &Arc<Self>) -> JoinHandle<()> {
    let scheduler = Arc::clone(self);
    let mut store_events = self.bus.subscribe(Topic::Store);

    tokio::spawn(async move {
      if scheduler.store.is_initializing() {
        loop {
          match store_events.recv().await {
            Some(Event::StoreReady) => break,
            Some(_) => continue,
            None => {
              warn!("Event bus closed before the store became ready");
              return;
            },
          }
        }
      }

      let period = scheduler.period;
      let mut interval = tokio::time::interval_at(Instant::now() + period, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
      info!(period = ?period, "Rescrape scheduler armed");

      loop {
        interval.tick().await;
        let outcome = scheduler.fire().await;
        debug!(?outcome, "Scheduled rescrape");
      }
    })
  }

  /// Runs one cycle now, if it is due.
  pub async fn fire(&self) -> RescrapeOutcome { self.fire_at(Utc::now()).await }

  /// Runs one cycle as if the current time were `now`.
  pub async fn fire_at(&self, now: DateTime<Utc>) -> RescrapeOutcome {
    if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
      debug!("Rescrape already running");
      return RescrapeOutcome::AlreadyRunning;
    }
    let _running = RunningGuard(&self.running);

    match self.is_due(now).await {
      Ok(None) => {},
      Ok(Some(outcome)) => return outcome,
      Err(e) => return RescrapeOutcome::Failed(e.to_string()),
    }

    match tokio::time::timeout(self.timeout, self.cycle()).await {
      Ok(Ok(count)) => {
        let stamp = PreferenceValue::Integer(now.timestamp());
        if let Err(e) = self.preferences.set(PreferenceKey::LastRematchTime, stamp).await {
          error!(error = %e, "Failed to record rescrape time");
        }
        info!(count, "Rescrape finished");
        self.bus.publish(Event::RescrapeFinished { count });
        RescrapeOutcome::Completed { count }
      },
      Ok(Err(e)) => {
        error!(error = %e, "Rescrape failed");
        RescrapeOutcome::Failed(e.to_string())
      },
      Err(_) => {
        warn!(timeout = ?self.timeout, "Rescrape exceeded its timeout");
        RescrapeOutcome::TimedOut
      },
    }
  }

  /// `Some(outcome)` when the cycle must not run.
  async fn is_due(&self, now: DateTime<Utc>) -> Result<Option<RescrapeOutcome>> {
    let allowed = self.preferences.get(PreferenceKey::AllowRoutineRescrape).await?;
    if !allowed.as_bool().unwrap_or(true) {
      debug!("Routine rescrape is disabled");
      return Ok(Some(RescrapeOutcome::Disabled));
    }

    let last = self.preferences.get(PreferenceKey::LastRematchTime).await?.as_i64().unwrap_or(0);
    let min_gap = self.period.saturating_sub(self.tolerance).as_secs() as i64;
    if now.timestamp() - last < min_gap {
      debug!(last, "Rescrape is not due yet");
      return Ok(Some(RescrapeOutcome::TooSoon));
    }
    Ok(None)
  }

  /// Loads the preprint records, rescrapes them and persists the result.
  async fn cycle(&self) -> Result<usize> {
    let candidates =
      self.store.load(&preprint_predicate(), SortKey::AddTime, SortOrder::Ascending).await?;
    if candidates.is_empty() {
      return Ok(0);
    }

    let scrapers = self.preferences.get(PreferenceKey::RescrapeScrapers).await?;
    let scrapers = scrapers.as_list().unwrap_or_default().to_vec();
    info!(count = candidates.len(), "Rescraping preprints");

    let payloads = candidates.into_iter().map(ScrapePayload::Draft).collect();
    let drafts = self.scraper.scrape(payloads, &scrapers, !scrapers.is_empty()).await?;
    Ok(self.pipeline.update(drafts).await.len())
  }
}

/// Matches records with an empty venue or a venue naming a preprint server.
pub fn preprint_predicate() -> String {
  std::iter::once(r#"publication == """#.to_string())
    .chain(
      PREPRINT_INDICATORS.iter().map(|indicator| format!(r#"publication CONTAINS[c] "{indicator}""#)),
    )
    .collect::<Vec<_>>()
    .join(" OR ")
}
