//! Integration tests for local reconciliation
//!
//! - Create / Replace / Skip decisions against a temporary mirror
//! - `_vN` preservation and the overwrite policy
//! - Pruning of vanished documents and abort behavior
//! - Path template layouts and semester selection

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use coursesync_core::domain::{CourseNode, DocumentNode, FolderNode, SemesterNode, Snapshot};
use coursesync_sync::{SyncError, TemplateError, TreeBuilder, TreeSyncer};

use crate::common::{self, Fail, Harness, ALWAYS_BEGIN, ALWAYS_END, DEFAULT_FOLDER};

async fn built(harness: &Harness) -> Snapshot {
    common::seed_catalog(&harness.catalog);
    TreeBuilder::new(harness.services.clone()).build().await.unwrap();
    harness.store.saved().expect("build saved a snapshot")
}

fn analysis_dir(root: &Path) -> PathBuf {
    root.join("WS 202425").join("Analysis")
}

fn mtime_secs(path: &Path) -> u64 {
    std::fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Points the snapshot's copy of a document at new remote metadata
fn set_document(snapshot: &mut Snapshot, id: &str, changed: i64, size: u64) {
    fn visit(folder: &mut FolderNode, id: &str, changed: i64, size: u64) -> bool {
        if let Some(d) = folder.documents.iter_mut().find(|d| d.id == id) {
            d.changed = changed;
            d.size = size;
            return true;
        }
        folder
            .folders
            .iter_mut()
            .any(|f| visit(f, id, changed, size))
    }
    let found = snapshot
        .semesters
        .iter_mut()
        .flat_map(|s| s.courses.iter_mut())
        .any(|c| visit(&mut c.root, id, changed, size));
    assert!(found, "document {id} not in snapshot");
}

#[tokio::test]
async fn test_sync_downloads_then_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();

    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 4);
    assert_eq!(harness.catalog.downloads(), 4);

    let course_dir = analysis_dir(dir.path());
    assert_eq!(
        file_names(&course_dir),
        ["Slides", "intro.pdf", "syllabus.txt"]
    );
    assert_eq!(std::fs::read(course_dir.join("Slides/week1.pdf")).unwrap(), b"week one");
    assert_eq!(mtime_secs(&course_dir.join("syllabus.txt")), 1_700_000_300);
    assert!(dir
        .path()
        .join("WS 202425/Übung zu Analysis/sheet1.pdf")
        .exists());

    // Nothing changed remotely: no downloads, no renames.
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 0);
    assert_eq!(harness.catalog.downloads(), 4);
    assert_eq!(
        file_names(&course_dir),
        ["Slides", "intro.pdf", "syllabus.txt"]
    );
    assert_eq!(harness.store.saves(), 1);
}

#[tokio::test]
async fn test_changed_document_keeps_previous_versions() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    syncer.sync(&mut snapshot, false).await.unwrap();

    harness.catalog.modify("d3", 1_800_000_000, b"syllabus v2");
    set_document(&mut snapshot, "d3", 1_800_000_000, 11);
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 1);

    harness.catalog.modify("d3", 1_900_000_000, b"syllabus, third");
    set_document(&mut snapshot, "d3", 1_900_000_000, 15);
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 1);

    let course_dir = analysis_dir(dir.path());
    assert_eq!(std::fs::read(course_dir.join("syllabus_v1.txt")).unwrap(), b"syllabus");
    assert_eq!(std::fs::read(course_dir.join("syllabus_v2.txt")).unwrap(), b"syllabus v2");
    assert_eq!(std::fs::read(course_dir.join("syllabus.txt")).unwrap(), b"syllabus, third");
    assert_eq!(mtime_secs(&course_dir.join("syllabus.txt")), 1_900_000_000);
}

#[tokio::test]
async fn test_local_edit_is_versioned_and_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    syncer.sync(&mut snapshot, false).await.unwrap();

    let intro = analysis_dir(dir.path()).join("intro.pdf");
    std::fs::write(&intro, b"my annotations").unwrap();

    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 1);
    assert_eq!(std::fs::read(&intro).unwrap(), b"intro");
    assert_eq!(
        std::fs::read(analysis_dir(dir.path()).join("intro_v1.pdf")).unwrap(),
        b"my annotations"
    );
}

#[tokio::test]
async fn test_overwrite_replaces_without_versions() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.overwrite(true));
    let mut snapshot = built(&harness).await;
    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    syncer.sync(&mut snapshot, false).await.unwrap();

    harness.catalog.modify("d3", 1_800_000_000, b"syllabus v2");
    set_document(&mut snapshot, "d3", 1_800_000_000, 11);
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 1);

    let course_dir = analysis_dir(dir.path());
    assert_eq!(
        file_names(&course_dir),
        ["Slides", "intro.pdf", "syllabus.txt"]
    );
    assert_eq!(std::fs::read(course_dir.join("syllabus.txt")).unwrap(), b"syllabus v2");
}

#[tokio::test]
async fn test_vanished_document_is_pruned_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    harness.catalog.fail("download:d4", Fail::NotFound);

    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 4);

    assert!(snapshot
        .find_course("c2")
        .unwrap()
        .root
        .find_document("d4")
        .is_none());
    assert_eq!(harness.store.saves(), 2);
    assert_eq!(harness.store.saved(), Some(snapshot));
}

#[tokio::test]
async fn test_unauthorized_download_aborts_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.workers(1));
    let mut snapshot = built(&harness).await;
    let before = snapshot.clone();
    harness.catalog.fail("download:d1", Fail::Unauthorized);
    harness.catalog.fail("download:d4", Fail::NotFound);

    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    syncer.sync(&mut snapshot, false).await.unwrap();

    assert_eq!(snapshot, before);
    assert_eq!(harness.store.saves(), 1);
    assert_eq!(harness.credentials.invalidations(), 1);
}

#[tokio::test]
async fn test_lecture_template_nests_exercises() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.path_template(":lecture/:type"));
    let mut snapshot = built(&harness).await;

    TreeSyncer::new(harness.services.clone())
        .unwrap()
        .sync(&mut snapshot, false)
        .await
        .unwrap();

    assert!(dir.path().join("Analysis/vorlesung/syllabus.txt").exists());
    assert!(dir.path().join("Analysis/vorlesung/Slides/week1.pdf").exists());
    assert!(dir.path().join("Analysis/uebung/sheet1.pdf").exists());
}

#[tokio::test]
async fn test_past_semesters_need_include_all() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let catalog = &harness.catalog;
    catalog.semester("s0", "SS 2020", 1_585_699_200, 1_601_510_400);
    catalog.course("s0", "c9", "Archiv", 1);
    catalog.document("c9", None, "d9", "old.pdf", 1_590_000_000, b"old");
    TreeBuilder::new(harness.services.clone()).build().await.unwrap();
    let mut snapshot = harness.store.saved().unwrap();

    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 0);
    assert!(!dir.path().join("SS 2020").exists());

    assert_eq!(syncer.sync(&mut snapshot, true).await.unwrap(), 1);
    assert!(dir.path().join("SS 2020/Archiv/old.pdf").exists());
}

#[tokio::test]
async fn test_default_folder_node_maps_to_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.catalog.document("c1", None, "d1", "a.txt", 100, b"a");

    let mut general = FolderNode::new("f0", DEFAULT_FOLDER);
    general.documents.push(DocumentNode::new("d1", "a.txt", 100, 1));
    let mut course = CourseNode::new("c1", "Analysis", 1);
    course.root.folders.push(general);
    let mut semester = SemesterNode::new("s1", "WS 2024/25", ALWAYS_BEGIN, ALWAYS_END);
    semester.courses.push(course);
    let mut snapshot = Snapshot {
        semesters: vec![semester],
    };

    TreeSyncer::new(harness.services.clone())
        .unwrap()
        .sync(&mut snapshot, false)
        .await
        .unwrap();

    let course_dir = analysis_dir(dir.path());
    assert_eq!(file_names(&course_dir), ["a.txt"]);
}

#[tokio::test]
async fn test_shutdown_skips_sync() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    harness.services.shutdown.cancel();

    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 0);
    assert_eq!(harness.catalog.downloads(), 0);
}

#[test]
fn test_unknown_placeholder_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.path_template(":semester/:room"));

    let err = TreeSyncer::new(harness.services.clone()).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Template(TemplateError::UnknownPlaceholder(ref name)) if name == "room"
    ));
}

#[tokio::test]
async fn test_written_mtime_matches_node_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let mut snapshot = built(&harness).await;
    TreeSyncer::new(harness.services.clone())
        .unwrap()
        .sync(&mut snapshot, false)
        .await
        .unwrap();

    let modified = std::fs::metadata(analysis_dir(dir.path()).join("intro.pdf"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified, UNIX_EPOCH + Duration::from_secs(1_700_000_100));
}

#[tokio::test]
async fn test_abort_leaves_stale_local_files_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.workers(1));
    let catalog = &harness.catalog;
    catalog.semester("s1", "WS 2024/25", ALWAYS_BEGIN, ALWAYS_END);
    catalog.course("s1", "c1", "Bulk", 1);
    let ids: Vec<String> = (0..40).map(|i| format!("d{i:02}")).collect();
    for id in &ids {
        catalog.document("c1", None, id, &format!("{id}.txt"), 1_700_000_000, b"remote");
    }
    TreeBuilder::new(harness.services.clone()).build().await.unwrap();
    let mut snapshot = harness.store.saved().unwrap();

    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    assert_eq!(syncer.sync(&mut snapshot, false).await.unwrap(), 40);

    let course_dir = dir.path().join("WS 202425").join("Bulk");
    for id in &ids {
        std::fs::write(course_dir.join(format!("{id}.txt")), b"edited locally").unwrap();
        catalog.fail(&format!("download:{id}"), Fail::Unauthorized);
    }

    let scheduled = syncer.sync(&mut snapshot, false).await.unwrap();
    assert!(scheduled < ids.len(), "scheduled {scheduled} downloads after the abort");
    assert_eq!(harness.catalog.downloads(), 40);
    assert_eq!(harness.credentials.invalidations(), 1);

    let expected: Vec<String> = ids.iter().map(|id| format!("{id}.txt")).collect();
    assert_eq!(file_names(&course_dir), expected);
    for id in &ids {
        let content = std::fs::read(course_dir.join(format!("{id}.txt"))).unwrap();
        assert_eq!(content, b"edited locally");
    }
}

#[tokio::test]
async fn test_connection_loss_keeps_local_edits() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_config(dir.path(), |b| b.workers(1));
    let mut snapshot = built(&harness).await;
    let syncer = TreeSyncer::new(harness.services.clone()).unwrap();
    syncer.sync(&mut snapshot, false).await.unwrap();

    let course_dir = analysis_dir(dir.path());
    for name in ["intro.pdf", "syllabus.txt"] {
        std::fs::write(course_dir.join(name), b"annotated").unwrap();
    }
    harness.catalog.fail("download:d1", Fail::Connection);
    harness.catalog.fail("download:d3", Fail::Connection);

    syncer.sync(&mut snapshot, false).await.unwrap();

    assert_eq!(
        file_names(&course_dir),
        ["Slides", "intro.pdf", "syllabus.txt"]
    );
    assert_eq!(std::fs::read(course_dir.join("intro.pdf")).unwrap(), b"annotated");
    assert_eq!(std::fs::read(course_dir.join("syllabus.txt")).unwrap(), b"annotated");
    assert_eq!(harness.credentials.invalidations(), 0);
}
