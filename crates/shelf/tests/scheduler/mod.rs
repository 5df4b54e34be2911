use chrono::{TimeDelta, Utc};

use super::*;

/// A harness holding one preprint and a scraper that finds its venue.
fn preprint_harness() -> Harness {
  let harness = Harness::new();
  let mut draft = PaperDraft::new("Attention Is All You Need");
  draft.publication = "arXiv preprint arXiv:1706.03762".into();
  harness.seed(draft);
  harness.seed(PaperDraft { publication: "NeurIPS".into(), ..PaperDraft::new("Published") });
  *harness.scraper.venue.lock().unwrap() = Some("NeurIPS".into());
  harness
}

async fn last_rematch(harness: &Harness) -> i64 {
  harness.preferences.get(PreferenceKey::LastRematchTime).await.unwrap().as_i64().unwrap()
}

#[traced_test]
#[tokio::test]
async fn test_fire_rescrapes_preprints_only() -> TestResult<()> {
  let harness = preprint_harness();
  let scheduler = harness.scheduler();
  let now = Utc::now();

  let outcome = scheduler.fire_at(now).await;

  assert_eq!(outcome, RescrapeOutcome::Completed { count: 1 });
  assert_eq!(last_rematch(&harness).await, now.timestamp());
  let published = harness
    .store
    .load(r#"publication == "NeurIPS""#, SortKey::Title, SortOrder::Ascending)
    .await?;
  assert_eq!(published.len(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_second_fire_within_period_is_too_soon() -> TestResult<()> {
  let harness = preprint_harness();
  let scheduler = harness.scheduler();
  let first = Utc::now();

  assert_eq!(scheduler.fire_at(first).await, RescrapeOutcome::Completed { count: 1 });
  let second = scheduler.fire_at(first + TimeDelta::days(5)).await;

  assert_eq!(second, RescrapeOutcome::TooSoon);
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 1);
  assert_eq!(last_rematch(&harness).await, first.timestamp());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_fire_within_tolerance_runs() -> TestResult<()> {
  let harness = preprint_harness();
  let scheduler = harness.scheduler();
  let first = Utc::now();
  scheduler.fire_at(first).await;

  // Six days is the seven day period minus one day of tolerance
  let outcome = scheduler.fire_at(first + TimeDelta::days(6)).await;

  assert_eq!(outcome, RescrapeOutcome::Completed { count: 0 });
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 1);
  assert_eq!(last_rematch(&harness).await, (first + TimeDelta::days(6)).timestamp());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_disabled_rescrape_does_nothing() -> TestResult<()> {
  let harness = preprint_harness();
  harness
    .preferences
    .set(PreferenceKey::AllowRoutineRescrape, PreferenceValue::Bool(false))
    .await?;

  let outcome = harness.scheduler().fire().await;

  assert_eq!(outcome, RescrapeOutcome::Disabled);
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 0);
  assert_eq!(last_rematch(&harness).await, 0);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_configured_scrapers_are_exclusive() -> TestResult<()> {
  let harness = preprint_harness();
  let scrapers = vec!["pdf".to_string()];
  harness
    .preferences
    .set(PreferenceKey::RescrapeScrapers, PreferenceValue::List(scrapers.clone()))
    .await?;

  harness.scheduler().fire().await;

  assert_eq!(*harness.scraper.last_used.lock().unwrap(), scrapers);
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_concurrent_fire_is_rejected() -> TestResult<()> {
  let harness = preprint_harness();
  *harness.scraper.delay.lock().unwrap() = Duration::from_secs(10);
  let scheduler = Arc::new(harness.scheduler());

  let running = tokio::spawn({
    let scheduler = scheduler.clone();
    async move { scheduler.fire().await }
  });
  tokio::time::sleep(Duration::from_millis(1)).await;

  assert_eq!(scheduler.fire().await, RescrapeOutcome::AlreadyRunning);
  assert_eq!(running.await?, RescrapeOutcome::Completed { count: 1 });
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 1);
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_slow_cycle_times_out() -> TestResult<()> {
  let harness = preprint_harness();
  *harness.scraper.delay.lock().unwrap() = Duration::from_secs(2 * 60 * 60);
  let scheduler = harness.scheduler();

  assert_eq!(scheduler.fire().await, RescrapeOutcome::TimedOut);
  assert_eq!(last_rematch(&harness).await, 0);

  // The in-flight flag is released with the abandoned cycle
  assert_eq!(scheduler.fire().await, RescrapeOutcome::TimedOut);
  assert!(logs_contain("Rescrape exceeded its timeout"));

  // Once the scraper keeps up again the next cycle goes through
  *harness.scraper.delay.lock().unwrap() = Duration::ZERO;
  assert_eq!(scheduler.fire().await, RescrapeOutcome::Completed { count: 1 });
  assert!(last_rematch(&harness).await > 0);
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_armed_scheduler_skips_first_tick() -> TestResult<()> {
  let harness = preprint_harness();
  let scheduler = Arc::new(
    harness
      .scheduler()
      .with_period(Duration::from_secs(100))
      .with_tolerance(Duration::from_secs(10)),
  );
  let mut events = harness.bus.subscribe(Topic::Rescrape);

  let task = scheduler.arm();
  tokio::time::sleep(Duration::from_secs(50)).await;
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 0);

  assert_eq!(events.recv().await, Some(Event::RescrapeFinished { count: 1 }));
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 1);
  task.abort();
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_armed_scheduler_waits_for_store() -> TestResult<()> {
  let harness = preprint_harness();
  harness.store.initializing.store(true, Ordering::SeqCst);
  let scheduler = Arc::new(harness.scheduler().with_period(Duration::from_secs(100)));
  let mut events = harness.bus.subscribe(Topic::Rescrape);

  let task = scheduler.arm();
  tokio::time::sleep(Duration::from_secs(250)).await;
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 0);

  harness.store.initializing.store(false, Ordering::SeqCst);
  harness.bus.publish(Event::StoreReady);

  assert_eq!(events.recv().await, Some(Event::RescrapeFinished { count: 1 }));
  task.abort();
  Ok(())
}
