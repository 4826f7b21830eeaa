mod common;

use asset_curator::{AssetGuid, CuratorError, ExistenceState};
use common::{guid, TestProject};
use std::fs;

#[test]
fn unchanged_document_is_not_read_again() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &["tex.png"], &[]);
    project.write("tex.png", b"pixels");
    let curator = project.curator();

    assert_eq!(curator.ensure_updated(&path).unwrap(), guid(1));
    let reads = curator.file_read_count();
    assert_eq!(reads, 1);

    for _ in 0..3 {
        assert_eq!(curator.ensure_updated(&path).unwrap(), guid(1));
    }
    assert_eq!(curator.file_read_count(), reads);
}

#[test]
fn modified_document_is_reparsed() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    project.write_asset("a.asset", guid(1), 7, &["tex.png"], &[]);
    curator.ensure_updated(&path).unwrap();

    let info = curator.asset_info(guid(1)).unwrap();
    assert_eq!(info.document_info().settings_hash, 7);
    assert!(info.document_info().transform_dependencies.contains("tex.png"));
    assert_eq!(curator.file_read_count(), 2);
}

#[test]
fn moved_document_keeps_its_identity() {
    let project = TestProject::new();
    let old_path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let user = project.write_asset("user.asset", guid(2), 0, &[&guid(1).to_string()], &[]);
    let curator = project.curator();
    curator.ensure_updated(&old_path).unwrap();
    curator.ensure_updated(&user).unwrap();

    let new_path = project.path("moved/b.asset");
    fs::create_dir_all(new_path.parent().unwrap()).unwrap();
    fs::rename(&old_path, &new_path).unwrap();

    assert_eq!(curator.ensure_updated(&new_path).unwrap(), guid(1));
    let info = curator.asset_info(guid(1)).unwrap();
    assert_eq!(info.absolute_path(), new_path.as_path());
    assert_eq!(curator.known_assets().len(), 2);
    assert!(curator.file_status(&old_path).is_none());

    // The consumer's GUID dependency follows the move.
    assert_eq!(
        curator.find_all_uses_of_path(&new_path, false).into_iter().collect::<Vec<_>>(),
        vec![guid(2)]
    );
    assert!(curator.asset_dependency_hash(guid(2)).is_ok());
}

#[test]
fn duplicate_guid_is_patched_once() {
    let project = TestProject::new();
    let first = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let copy = project.write_asset("copy.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();

    assert_eq!(curator.ensure_updated(&first).unwrap(), guid(1));
    let patched = curator.ensure_updated(&copy).unwrap();

    let expected = guid(1).combine_with_seed(&AssetGuid::stable_for_string(&copy.to_string_lossy()));
    assert_eq!(patched, expected);
    assert_ne!(patched, guid(1));
    assert_eq!(curator.asset_info(guid(1)).unwrap().absolute_path(), first.as_path());
    assert_eq!(curator.asset_info(patched).unwrap().absolute_path(), copy.as_path());

    // The copy on disk now declares the new GUID.
    let text = fs::read_to_string(&copy).unwrap();
    assert!(text.contains(&patched.to_string()));
}

#[test]
fn changed_guid_replaces_the_asset() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();
    curator.tick();

    project.write_asset("a.asset", guid(5), 0, &[], &[]);
    assert_eq!(curator.ensure_updated(&path).unwrap(), guid(5));
    assert_eq!(
        curator.asset_info(guid(1)).unwrap().existence_state(),
        ExistenceState::FileRemoved
    );

    curator.tick();
    assert!(curator.asset_info(guid(1)).is_none());
    assert!(curator.asset_info(guid(5)).is_some());
}

#[test]
fn missing_file_is_reported() {
    let project = TestProject::new();
    let curator = project.curator();
    let err = curator.ensure_updated(&project.path("nope.asset")).unwrap_err();
    assert!(matches!(err, CuratorError::FileNotFound { .. }));
}

#[test]
fn unparsable_document_is_an_error() {
    let project = TestProject::new();
    let path = project.write("broken.asset", b"{ not json");
    let curator = project.curator();
    let err = curator.ensure_updated(&path).unwrap_err();
    assert!(matches!(err, CuratorError::Parse { .. }));
    assert!(curator.known_assets().is_empty());
}

#[test]
fn unknown_extension_has_no_manager() {
    let project = TestProject::new();
    let path = project.write("notes.txt", b"hello");
    let curator = project.curator();
    let err = curator.ensure_updated(&path).unwrap_err();
    assert!(matches!(err, CuratorError::NoManager { .. }));
}

#[test]
fn removed_file_marks_asset_removed() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    curator.handle_file_change(&path).unwrap();
    curator.tick();

    project.remove("a.asset");
    curator.handle_file_change(&path).unwrap();
    assert_eq!(
        curator.asset_info(guid(1)).unwrap().existence_state(),
        ExistenceState::FileRemoved
    );

    let events = curator.tick();
    assert!(events
        .iter()
        .any(|e| e.guid == Some(guid(1)) && e.kind == asset_curator::CuratorEventKind::AssetRemoved));
    assert!(curator.asset_info(guid(1)).is_none());
}

#[test]
fn move_seen_as_removal_then_addition_is_a_modification() {
    let project = TestProject::new();
    let old_path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    curator.handle_file_change(&old_path).unwrap();
    curator.tick();

    let new_path = project.path("b.asset");
    fs::rename(&old_path, &new_path).unwrap();
    curator.handle_file_change(&old_path).unwrap();
    curator.handle_file_change(&new_path).unwrap();

    let info = curator.asset_info(guid(1)).unwrap();
    assert_eq!(info.absolute_path(), new_path.as_path());
    assert_eq!(info.existence_state(), ExistenceState::FileModified);
    assert_eq!(curator.known_assets().len(), 1);

    let events = curator.tick();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].guid, Some(guid(1)));
    assert_eq!(events[0].kind, asset_curator::CuratorEventKind::AssetModified);
    assert!(curator.asset_info(guid(1)).is_some());
}

#[test]
fn patched_guids_converge() {
    let project = TestProject::new();
    let first = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let copy = project.write_asset("copy.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    let first_guid = curator.ensure_updated(&first).unwrap();
    let copy_guid = curator.ensure_updated(&copy).unwrap();
    assert_ne!(first_guid, copy_guid);

    // A second round finds nothing to patch.
    let on_disk = (fs::read(&first).unwrap(), fs::read(&copy).unwrap());
    let reads = curator.file_read_count();
    assert_eq!(curator.ensure_updated(&first).unwrap(), first_guid);
    assert_eq!(curator.ensure_updated(&copy).unwrap(), copy_guid);
    assert_eq!(curator.file_read_count(), reads);
    assert_eq!((fs::read(&first).unwrap(), fs::read(&copy).unwrap()), on_disk);

    // Neither does a fresh curator visiting the files in the other order.
    let fresh = project.curator();
    assert_eq!(fresh.ensure_updated(&copy).unwrap(), copy_guid);
    assert_eq!(fresh.ensure_updated(&first).unwrap(), first_guid);
    assert_eq!((fs::read(&first).unwrap(), fs::read(&copy).unwrap()), on_disk);
}
