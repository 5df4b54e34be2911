//! Integration tests for the shelf CLI commands.
//!
//! Every test works on its own library directory and runs in serial to keep output readable.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::{tempdir, TempDir};

// Helper function to create a command working on the library in `root`
fn shelf(root: &Path) -> Command {
  let mut command = Command::cargo_bin("shelf").unwrap();
  command.arg("--path").arg(root).arg("--accept-defaults");
  command
}

// Helper to create an initialized library and a directory with one document to import
fn setup_library() -> (TempDir, PathBuf, PathBuf) {
  let dir = tempdir().unwrap();
  let root = dir.path().join("library");
  let inbox = dir.path().join("inbox");
  std::fs::create_dir_all(&inbox).unwrap();
  std::fs::write(inbox.join("graph_attention_networks.txt"), "attention over graph neighbourhoods")
    .unwrap();

  shelf(&root).arg("init").assert().success();
  (dir, root, inbox)
}

// The first paper id printed in a listing
fn first_id(output: &[u8]) -> String {
  String::from_utf8_lossy(output)
    .split_whitespace()
    .find(|word| word.len() == 36 && word.matches('-').count() == 4)
    .unwrap()
    .to_string()
}

#[test]
#[serial]
fn test_init_creates_library() {
  let dir = tempdir().unwrap();
  let root = dir.path().join("library");

  shelf(&root)
    .arg("init")
    .assert()
    .success()
    .stdout(predicate::str::contains("Library initialized"));

  assert!(root.join("shelf.db").exists());
  assert!(root.join("config.toml").exists());

  // Initializing again keeps the existing library
  shelf(&root).arg("init").assert().success();
}

#[test]
#[serial]
fn test_add_and_list() {
  let (_dir, root, inbox) = setup_library();
  let source = inbox.join("graph_attention_networks.txt");

  shelf(&root)
    .arg("add")
    .arg(inbox.join("*.txt"))
    .arg("--tag")
    .arg("reading")
    .assert()
    .success()
    .stdout(predicate::str::contains("graph attention networks"))
    .stdout(predicate::str::contains("Imported 1 papers"));

  // Imports are copied by default
  assert!(source.exists());
  let stored: Vec<_> = std::fs::read_dir(root.join("papers")).unwrap().collect();
  assert_eq!(stored.len(), 1);

  shelf(&root)
    .args(["list", "--search", "attention"])
    .assert()
    .success()
    .stdout(predicate::str::contains("graph attention networks"));

  shelf(&root)
    .args(["list", "--tag", "reading", "--detailed"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Tags: reading"));

  shelf(&root)
    .args(["list", "--search", "neighbourhoods", "--mode", "fulltext"])
    .assert()
    .success()
    .stdout(predicate::str::contains("graph attention networks"));

  shelf(&root)
    .args(["list", "--search", "transformers"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No papers found"));
}

#[test]
#[serial]
fn test_add_without_matches() {
  let (_dir, root, inbox) = setup_library();

  shelf(&root)
    .arg("add")
    .arg(inbox.join("*.pdf"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No files matched"));
}

#[test]
#[serial]
fn test_invalid_search_mode_fails() {
  let (_dir, root, _inbox) = setup_library();

  shelf(&root)
    .args(["list", "--search", "x", "--mode", "regex"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown search mode"));
}

#[test]
#[serial]
fn test_rescrape_and_rename() {
  let (_dir, root, inbox) = setup_library();
  shelf(&root).arg("add").arg(inbox.join("graph_attention_networks.txt")).assert().success();

  shelf(&root)
    .arg("rescrape")
    .assert()
    .success()
    .stdout(predicate::str::contains("Rescraped 1 preprints"));

  shelf(&root)
    .arg("rescrape")
    .assert()
    .success()
    .stdout(predicate::str::contains("use --force"));

  shelf(&root)
    .args(["rescrape", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Rescraped 1 preprints"));

  shelf(&root)
    .arg("rename-all")
    .assert()
    .success()
    .stdout(predicate::str::contains("Renamed files of 1 papers"));
}

#[test]
#[serial]
fn test_remove_deletes_paper_and_file() {
  let (_dir, root, inbox) = setup_library();
  shelf(&root).arg("add").arg(inbox.join("graph_attention_networks.txt")).assert().success();

  let listing = shelf(&root).arg("list").output().unwrap();
  let id = first_id(&listing.stdout);

  shelf(&root)
    .args(["remove", &id])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed 1 papers"));

  assert_eq!(std::fs::read_dir(root.join("papers")).unwrap().count(), 0);
  shelf(&root).arg("list").assert().success().stdout(predicate::str::contains("No papers found"));
}

#[test]
#[serial]
fn test_migrate_from_other_library() {
  let (_dir, source_root, inbox) = setup_library();
  shelf(&source_root).arg("add").arg(inbox.join("graph_attention_networks.txt")).assert().success();

  let target = tempdir().unwrap();
  shelf(target.path()).arg("init").assert().success();

  shelf(target.path())
    .arg("migrate")
    .arg("--from")
    .arg(source_root.join("shelf.db"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Migrated 1 papers"));
}
