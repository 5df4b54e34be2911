use super::*;

#[traced_test]
#[tokio::test]
async fn test_cut_import_moves_file_into_storage() -> TestResult<()> {
  let harness = Harness::new();
  harness.set_cut(true).await;
  let source = harness.inbox_file("attention.pdf");

  let created = harness.pipeline.create(vec![source.clone()]).await;

  assert_eq!(created.len(), 1);
  let draft = &created[0];
  assert_eq!(draft.main_url, format!("{}.pdf", draft.filename_stem()));
  assert!(!Path::new(&draft.main_url).is_absolute());
  assert!(!source.exists());
  assert_eq!(harness.stored_files(), vec![draft.main_url.clone()]);
  assert_eq!(harness.store.all(), created);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_copy_import_keeps_source() -> TestResult<()> {
  let harness = Harness::new();
  let source = harness.inbox_file("attention.pdf");

  let created = harness.pipeline.create(vec![source.clone()]).await;

  assert!(source.exists());
  assert_eq!(harness.stored_files(), vec![created[0].main_url.clone()]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_missing_primary_file_is_cleared() -> TestResult<()> {
  let harness = Harness::new();
  let missing = harness.inbox.join("gone.pdf");
  let draft = PaperDraft::new("Gone").with_main_url(missing.to_string_lossy());

  let updated = harness.pipeline.update(vec![draft.clone()]).await;

  assert_eq!(updated.len(), 1);
  assert_eq!(updated[0].id, draft.id);
  assert_eq!(updated[0].main_url, "");
  assert!(logs_contain("Primary file is missing"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_relocation_persists_blank_reference() -> TestResult<()> {
  let dir = tempdir()?;
  // A regular file where the storage directory should be
  let blocked = dir.path().join("storage");
  std::fs::write(&blocked, "not a directory")?;
  let harness = Harness::with_storage(dir, blocked);
  let source = harness.inbox_file("paper.pdf");

  let created = harness.pipeline.create(vec![source.clone()]).await;

  assert_eq!(created.len(), 1);
  assert_eq!(created[0].main_url, "");
  assert!(source.exists());
  assert!(logs_contain("Failed to relocate files"));
  Ok(())
}

/// A draft with a real primary file and a supplementary directory whose managed name is already
/// taken by a non-empty directory, so the supplementary relocation fails after the primary moved.
fn draft_with_blocked_supplementary(harness: &Harness) -> (PaperDraft, PathBuf) {
  let source = harness.inbox_file("paper.pdf");
  let figures = harness.inbox.join("figures");
  std::fs::create_dir_all(&figures).unwrap();
  std::fs::write(figures.join("plot.png"), "png").unwrap();

  let draft = PaperDraft::new("Paper")
    .with_main_url(source.to_string_lossy())
    .with_supplementary(figures.to_string_lossy());
  let blocker = harness.storage.join(format!("{}_sup1", draft.filename_stem()));
  std::fs::create_dir_all(&blocker).unwrap();
  std::fs::write(blocker.join("occupied"), "taken").unwrap();
  (draft, source)
}

#[traced_test]
#[tokio::test]
async fn test_failed_supplementary_relocation_restores_cut_primary() -> TestResult<()> {
  let harness = Harness::new();
  harness.set_cut(true).await;
  let (draft, source) = draft_with_blocked_supplementary(&harness);
  let blocker = format!("{}_sup1", draft.filename_stem());

  let updated = harness.pipeline.update(vec![draft]).await;

  assert_eq!(updated.len(), 1);
  assert_eq!(updated[0].main_url, "");
  assert!(source.exists());
  assert_eq!(harness.stored_files(), vec![blocker]);
  assert!(logs_contain("Failed to relocate files"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_supplementary_relocation_removes_copied_primary() -> TestResult<()> {
  let harness = Harness::new();
  let (draft, source) = draft_with_blocked_supplementary(&harness);
  let blocker = format!("{}_sup1", draft.filename_stem());

  let updated = harness.pipeline.update(vec![draft]).await;

  assert_eq!(updated.len(), 1);
  assert!(source.exists());
  assert_eq!(harness.stored_files(), vec![blocker]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_persistence_removes_copied_file() -> TestResult<()> {
  let harness = Harness::new();
  harness.store.fail_on("rejected");
  let kept = harness.inbox_file("kept.pdf");
  let rejected = harness.inbox_file("rejected.pdf");

  let created = harness.pipeline.create(vec![kept, rejected.clone()]).await;

  assert_eq!(created.len(), 1);
  assert_eq!(created[0].title, "kept");
  assert_eq!(harness.stored_files(), vec![created[0].main_url.clone()]);
  assert!(rejected.exists());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_persistence_moves_cut_file_back() -> TestResult<()> {
  let harness = Harness::new();
  harness.set_cut(true).await;
  harness.store.fail_on("rejected");
  let rejected = harness.inbox_file("rejected.pdf");

  let created = harness.pipeline.create(vec![rejected.clone()]).await;

  assert!(created.is_empty());
  assert!(rejected.exists());
  assert!(harness.stored_files().is_empty());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_drafts_are_not_announced() -> TestResult<()> {
  let harness = Harness::new();
  harness.store.fail_on("b");
  let mut events = harness.bus.subscribe(Topic::Entities);
  let drafts = vec![PaperDraft::new("a"), PaperDraft::new("b"), PaperDraft::new("c")];
  let expected: Vec<Uuid> = [&drafts[0], &drafts[2]].iter().map(|draft| draft.id).collect();

  let updated = harness.pipeline.update(drafts).await;

  assert_eq!(updated.iter().map(|draft| draft.id).collect::<Vec<_>>(), expected);
  assert_eq!(events.recv().await, Some(Event::EntitiesUpdated { ids: expected.clone() }));

  harness.pipeline.flush_cache_refreshes().await;
  assert_eq!(*harness.cache.refreshed.lock().unwrap(), expected);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_persisted_name_renames_file() -> TestResult<()> {
  let harness = Harness::new();
  harness.store.rename_main.store(true, Ordering::SeqCst);
  let source = harness.inbox_file("paper.pdf");

  let created = harness.pipeline.create(vec![source]).await;

  let expected = format!("{}_1.pdf", created[0].filename_stem());
  assert_eq!(created[0].main_url, expected);
  assert_eq!(harness.stored_files(), vec![expected]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_unavailable_store_short_circuits() -> TestResult<()> {
  let harness = Harness::new();
  harness.store.initializing.store(true, Ordering::SeqCst);
  let source = harness.inbox_file("paper.pdf");

  assert!(harness.pipeline.update(vec![PaperDraft::new("a")]).await.is_empty());
  assert!(harness.pipeline.create(vec![source]).await.is_empty());
  let loaded =
    harness.pipeline.load(&FilterOptions::default(), SortKey::Title, SortOrder::Ascending).await;
  assert!(loaded.is_empty());

  assert_eq!(harness.store.updates.load(Ordering::SeqCst), 0);
  assert_eq!(harness.scraper.calls.load(Ordering::SeqCst), 0);
  assert!(logs_contain("Record store is unavailable"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_create_into_categorizer_installs_single_tag() -> TestResult<()> {
  let harness = Harness::new();
  let reading = Categorizer::folder("Reading");
  let source = harness.inbox_file("paper.pdf");

  let created =
    harness.pipeline.create_into_categorizer(vec![source], &reading, CategorizerKind::Folder).await;

  assert_eq!(created[0].tags.len(), 1);
  assert_eq!(created[0].tags[0].name, "Reading");
  assert_eq!(created[0].tags[0].kind, CategorizerKind::Tag);
  assert!(created[0].folders.is_empty());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_categorize_twice_keeps_one_membership() -> TestResult<()> {
  let harness = Harness::new();
  let tag = Categorizer::tag("gnn");
  let drafts = harness.pipeline.update(vec![PaperDraft::new("a"), PaperDraft::new("b")]).await;

  let drafts = harness.pipeline.categorize(drafts, &tag, CategorizerKind::Tag).await;
  let drafts = harness.pipeline.categorize(drafts, &tag, CategorizerKind::Tag).await;

  assert_eq!(drafts.len(), 2);
  for draft in harness.store.all() {
    assert_eq!(draft.tags, vec![tag.clone()]);
  }
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_delete_removes_record_files_and_cache() -> TestResult<()> {
  let harness = Harness::new();
  let created = harness.pipeline.create(vec![harness.inbox_file("paper.pdf")]).await;
  let id = created[0].id;
  let mut events = harness.bus.subscribe(Topic::Entities);

  harness.pipeline.delete(&[id]).await;

  assert!(harness.store.all().is_empty());
  assert!(harness.stored_files().is_empty());
  assert_eq!(*harness.cache.deleted.lock().unwrap(), vec![id]);
  assert_eq!(events.recv().await, Some(Event::EntitiesDeleted { ids: vec![id] }));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_delete_supplementary() -> TestResult<()> {
  let harness = Harness::new();
  let draft = PaperDraft::new("paper")
    .with_main_url(harness.inbox_file("paper.pdf").to_string_lossy())
    .with_supplementary(harness.inbox_file("notes.txt").to_string_lossy());
  let stored = harness.pipeline.update(vec![draft]).await.remove(0);
  let supplementary = stored.supplementary_urls[0].clone();

  let updated = harness.pipeline.delete_supplementary(stored.clone(), &supplementary).await.unwrap();

  assert!(updated.supplementary_urls.is_empty());
  assert_eq!(harness.stored_files(), vec![stored.main_url]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_rename_all_follows_titles() -> TestResult<()> {
  let harness = Harness::new();
  let created = harness.pipeline.create(vec![harness.inbox_file("draft.pdf")]).await;
  harness.store.records.lock().unwrap()[0].title = "Final Title".into();

  let renamed = harness.pipeline.rename_all().await;

  assert_eq!(renamed.len(), 1);
  assert!(renamed[0].main_url.starts_with("Final_Title_"));
  assert_ne!(renamed[0].main_url, created[0].main_url);
  assert_eq!(harness.stored_files(), vec![renamed[0].main_url.clone()]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_scrape_restricts_sources() -> TestResult<()> {
  let harness = Harness::new();
  *harness.scraper.venue.lock().unwrap() = Some("ICLR".into());
  let drafts = harness.pipeline.update(vec![PaperDraft::new("a")]).await;

  let scraped = harness.pipeline.scrape(drafts, &["pdf".to_string()]).await;

  assert_eq!(scraped[0].publication, "ICLR");
  assert_eq!(*harness.scraper.last_used.lock().unwrap(), vec!["pdf".to_string()]);
  assert_eq!(harness.store.all()[0].publication, "ICLR");
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_migrate_copies_every_record() -> TestResult<()> {
  let source = MemoryStore::default();
  for title in ["a", "b"] {
    source.update(&PaperDraft::new(title)).await?;
  }
  let harness = Harness::new();

  let migrated = harness.pipeline.migrate(&source).await;

  assert_eq!(migrated.len(), 2);
  assert_eq!(harness.store.all().len(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_fulltext_load_goes_through_cache() -> TestResult<()> {
  let harness = Harness::new();
  let drafts = harness
    .pipeline
    .update(vec![PaperDraft::new("a"), PaperDraft::new("b"), PaperDraft::new("c")])
    .await;
  {
    let mut texts = harness.cache.texts.lock().unwrap();
    texts.insert(drafts[0].id, "Maximum Entropy methods".into());
    texts.insert(drafts[1].id, "nothing relevant".into());
    texts.insert(drafts[2].id, "entropy again".into());
  }

  let options = FilterOptions::default().with_search("entropy").with_mode(SearchMode::Fulltext);
  let found = harness.pipeline.load(&options, SortKey::Title, SortOrder::Ascending).await;
  let titles: Vec<_> = found.iter().map(|draft| draft.title.as_str()).collect();
  assert_eq!(titles, vec!["a", "c"]);

  let limited =
    harness.pipeline.load(&options.with_limit(1), SortKey::Title, SortOrder::Descending).await;
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].title, "c");
  Ok(())
}
