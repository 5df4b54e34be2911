use chrono::{TimeDelta, Utc};

use super::*;

/// A harness holding a small library with tags, folders and flags.
async fn library() -> Harness {
  let harness = Harness::new();
  let gnn = Categorizer::tag("gnn");
  let reading = Categorizer::folder("Reading");

  let mut gat = PaperDraft::new("Graph Attention Networks");
  gat.authors = "Petar Veličković".into();
  gat.flag = true;
  gat.tags.push(gnn.clone());
  gat.folders.push(reading.clone());

  let mut gcn = PaperDraft::new("Semi-Supervised Classification with Graph Convolutional Networks");
  gcn.authors = "Thomas Kipf, Max Welling".into();
  gcn.tags.push(gnn);

  let mut transformer = PaperDraft::new("Attention Is All You Need");
  transformer.publication = "NeurIPS".into();
  transformer.flag = true;
  transformer.folders.push(reading);

  harness.pipeline.update(vec![gat, gcn, transformer]).await;
  harness
}

async fn titles(harness: &Harness, options: FilterOptions) -> Vec<String> {
  harness
    .pipeline
    .load(&options, SortKey::Title, SortOrder::Ascending)
    .await
    .into_iter()
    .map(|draft| draft.title)
    .collect()
}

#[traced_test]
#[tokio::test]
async fn test_general_search_spans_fields() {
  let harness = library().await;

  assert_eq!(titles(&harness, FilterOptions::default().with_search("graph networks")).await, vec![
    "Graph Attention Networks",
    "Semi-Supervised Classification with Graph Convolutional Networks",
  ]);
  assert_eq!(titles(&harness, FilterOptions::default().with_search("welling")).await, vec![
    "Semi-Supervised Classification with Graph Convolutional Networks",
  ]);
  assert_eq!(titles(&harness, FilterOptions::default().with_search("neurips")).await, vec![
    "Attention Is All You Need",
  ]);
}

#[traced_test]
#[tokio::test]
async fn test_structural_constraints_combine() {
  let harness = library().await;

  assert_eq!(titles(&harness, FilterOptions::default().flagged().with_tag("gnn")).await, vec![
    "Graph Attention Networks",
  ]);
  assert_eq!(titles(&harness, FilterOptions::default().with_folder("Reading")).await, vec![
    "Attention Is All You Need",
    "Graph Attention Networks",
  ]);
  let first_match = FilterOptions::default().with_search("attention").with_limit(1);
  assert_eq!(titles(&harness, first_match).await, vec!["Attention Is All You Need"]);
}

#[traced_test]
#[tokio::test]
async fn test_advanced_search_with_inline_limit() {
  let harness = library().await;
  let options = FilterOptions::default()
    .with_search(r#"ANY tags.name == "gnn" LIMIT(1)"#)
    .with_mode(SearchMode::Advanced);

  assert_eq!(titles(&harness, options).await, vec!["Graph Attention Networks"]);
}

#[traced_test]
#[tokio::test]
async fn test_advanced_relative_date() {
  let harness = library().await;
  let mut old = PaperDraft::new("Old Paper");
  old.add_time = Utc::now() - TimeDelta::days(30);
  harness.seed(old);

  let options =
    FilterOptions::default().with_search("addTime > [7 DAYS]").with_mode(SearchMode::Advanced);

  assert_eq!(titles(&harness, options).await, vec!["Old Paper"]);
}

#[traced_test]
#[tokio::test]
async fn test_invalid_advanced_search_loads_nothing() {
  let harness = library().await;
  let options = FilterOptions::default().with_search("title ==").with_mode(SearchMode::Advanced);

  assert!(titles(&harness, options).await.is_empty());
  assert!(logs_contain("Failed to load records"));
}

#[traced_test]
#[tokio::test]
async fn test_out_of_range_relative_date_loads_nothing() {
  let harness = library().await;
  let options = FilterOptions::default()
    .with_search("addTime > [100000000 DAYS]")
    .with_mode(SearchMode::Advanced);

  assert!(titles(&harness, options).await.is_empty());
  assert!(logs_contain("Relative date is out of range"));
  assert!(logs_contain("Failed to load records"));
}

#[traced_test]
#[tokio::test]
async fn test_deeply_nested_search_loads_nothing() {
  let harness = library().await;
  let nested = format!("{}flag == true{}", "(".repeat(100_000), ")".repeat(100_000));
  let options = FilterOptions::default().with_search(nested).with_mode(SearchMode::Advanced);

  assert!(titles(&harness, options).await.is_empty());
  assert!(logs_contain("nesting deeper than 256 levels"));
}
