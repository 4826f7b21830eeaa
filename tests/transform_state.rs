mod common;

use asset_curator::{
    AssetFileHeader, CuratorError, DocumentInfo, ThumbnailInfo, TransformFlags, TransformOutcome,
    TransformState,
};
use common::{default_managers, guid, FailingManager, TestProject};
use std::sync::atomic::Ordering;

#[test]
fn transform_writes_outputs_with_header() {
    let project = TestProject::new();
    project.write("tex.png", b"texture");
    let document = DocumentInfo::new(guid(1), "Asset")
        .with_dependency("tex.png")
        .with_output("low");
    let path = project.write_document("a.asset", &document);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    let status = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(status.state, TransformState::NeedsTransform);
    let asset_hash = status.asset_hash.unwrap();

    let outcome = curator.transform_asset(guid(1), TransformFlags::default(), None).unwrap();
    assert_eq!(outcome, TransformOutcome::Transformed);

    for name in ["a.bin", "a_low.bin"] {
        let output = project.path("AssetCache/Default").join(name);
        let header = AssetFileHeader::read_from_file(&output).unwrap().unwrap();
        assert_eq!(header, AssetFileHeader::new(asset_hash, 1));
    }
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::UpToDate
    );

    let again = curator.transform_asset(guid(1), TransformFlags::default(), None).unwrap();
    assert_eq!(again, TransformOutcome::UpToDate);
}

#[test]
fn changed_input_needs_transform_again() {
    let project = TestProject::new();
    let tex = project.write("tex.png", b"v1");
    let path = project.write_asset("a.asset", guid(1), 0, &["tex.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();
    curator.transform_asset(guid(1), TransformFlags::default(), None).unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::UpToDate));

    project.write("tex.png", b"v2");
    curator.handle_file_change(&tex).unwrap();
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::NeedsTransform
    );
}

#[test]
fn dependencies_are_transformed_first() {
    let project = TestProject::new();
    let base = project.write_asset("base.asset", guid(1), 0, &[], &[]);
    let top = project.write_asset("top.asset", guid(2), 0, &[&guid(1).to_string()], &[]);
    let curator = project.curator();
    curator.ensure_updated(&base).unwrap();
    curator.ensure_updated(&top).unwrap();

    curator.transform_asset(guid(2), TransformFlags::default(), None).unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::UpToDate));
    assert_eq!(curator.transform_state(guid(2)), Some(TransformState::UpToDate));
}

#[test]
fn thumbnail_carries_reference_hash() {
    let project = TestProject::new();
    project.write("tex.png", b"texture");
    let document = DocumentInfo::new(guid(1), "Mesh").with_reference("tex.png");
    let path = project.write_document("rock.mesh", &document);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    curator.transform_asset(guid(1), TransformFlags::default(), None).unwrap();
    let status = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(status.state, TransformState::UpToDate);

    let thumbnail = project.path("AssetCache/Thumbnails/rock.jpg");
    let info = ThumbnailInfo::read_from_file(&thumbnail).unwrap().unwrap();
    assert_eq!(Some(info.reference_hash), status.thumb_hash);
    assert_eq!(Ok(info.reference_hash), curator.asset_reference_hash(guid(1)));
}

#[test]
fn skipped_thumbnail_leaves_needs_thumbnail() {
    let project = TestProject::new();
    let path = project.write_document("rock.mesh", &DocumentInfo::new(guid(1), "Mesh"));
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    let flags = TransformFlags {
        skip_thumbnail: true,
        ..Default::default()
    };
    curator.transform_asset(guid(1), flags, None).unwrap();
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::NeedsThumbnail
    );

    curator.create_thumbnail(guid(1)).unwrap();
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::UpToDate
    );
}

#[test]
fn thumbnail_needs_support() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &[], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();
    assert!(matches!(
        curator.create_thumbnail(guid(1)),
        Err(CuratorError::ThumbnailUnsupported(_))
    ));
}

#[test]
fn blocked_assets_are_not_transformed() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &["missing.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    match curator.transform_asset(guid(1), TransformFlags::default(), None) {
        Err(CuratorError::TransformBlocked { guid: blocked, state }) => {
            assert_eq!(blocked, guid(1));
            assert_eq!(state, TransformState::MissingTransformDependency);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!project.path("AssetCache/Default/a.bin").exists());
}

#[test]
fn transform_error_propagates_until_fixed() {
    let project = TestProject::new();
    let failing = FailingManager::new();
    let switch = failing.failing.clone();
    let mut managers = default_managers();
    managers.register(failing);

    let broken = project.write_document("broken.fail", &DocumentInfo::new(guid(1), "Failing"));
    let user = project.write_asset("user.asset", guid(2), 0, &[&guid(1).to_string()], &[]);
    let user_of_user = project.write_asset("top.asset", guid(3), 0, &[&guid(2).to_string()], &[]);
    let curator = project.curator_with(managers);
    for path in [&broken, &user, &user_of_user] {
        curator.ensure_updated(path).unwrap();
    }
    curator.process_pending_updates();

    let err = curator
        .transform_asset(guid(1), TransformFlags::default(), None)
        .unwrap_err();
    assert!(matches!(err, CuratorError::TransformFailed { .. }));
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::TransformError));
    assert!(curator.asset_info(guid(1)).unwrap().transform_error().is_some());

    for n in [2, 3] {
        let state = curator.transform_state(guid(n)).unwrap();
        assert!(matches!(state, TransformState::Unknown | TransformState::TransformError));
    }
    curator.process_pending_updates();
    for n in [2, 3] {
        assert_eq!(curator.transform_state(guid(n)), Some(TransformState::TransformError));
    }

    // Re-evaluation keeps the error; it is sticky until a transform succeeds.
    curator.notify_of_asset_change(guid(2));
    curator.process_pending_updates();
    assert_eq!(curator.transform_state(guid(2)), Some(TransformState::TransformError));

    let err = curator
        .transform_asset(guid(3), TransformFlags::default(), None)
        .unwrap_err();
    assert!(matches!(err, CuratorError::TransformFailed { .. }));

    switch.store(false, Ordering::Relaxed);
    assert_eq!(
        curator.transform_asset(guid(1), TransformFlags::default(), None).unwrap(),
        TransformOutcome::Transformed
    );
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::UpToDate));
    curator.process_pending_updates();
    assert_eq!(curator.transform_state(guid(2)), Some(TransformState::NeedsTransform));
    assert_eq!(curator.transform_state(guid(3)), Some(TransformState::NeedsTransform));
}

#[test]
fn transform_all_reports_each_asset() {
    let project = TestProject::new();
    let good = project.write_asset("good.asset", guid(1), 0, &[], &[]);
    let blocked = project.write_asset("blocked.asset", guid(2), 0, &["nowhere.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&good).unwrap();
    curator.ensure_updated(&blocked).unwrap();

    let summary = curator.transform_all_assets(TransformFlags::default(), None);
    assert_eq!(summary.transformed, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, guid(2));

    let stats = curator.transform_stats();
    assert_eq!(stats.num_assets, 2);
    assert_eq!(stats.count(TransformState::UpToDate), 1);
    assert_eq!(stats.count(TransformState::MissingTransformDependency), 1);
}

#[test]
fn invalidate_by_state_requeues_matching_assets() {
    let project = TestProject::new();
    let good = project.write_asset("good.asset", guid(1), 0, &[], &[]);
    let blocked = project.write_asset("blocked.asset", guid(2), 0, &["nowhere.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&good).unwrap();
    curator.ensure_updated(&blocked).unwrap();
    curator.process_pending_updates();

    curator.invalidate_assets_with_transform_state(TransformState::MissingTransformDependency);
    assert_eq!(curator.transform_state(guid(2)), Some(TransformState::Unknown));
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::NeedsTransform));
    assert_eq!(curator.pending_updates(), 1);
}
