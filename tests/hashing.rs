mod common;

use asset_curator::{combine_hash, hash_bytes, HashError, TransformState};
use common::{guid, TestProject};

#[test]
fn single_file_dependency_hash() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0xAA, &["tex.png"], &[]);
    project.write("tex.png", b"texture bytes");
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    let expected = combine_hash(0xAA, hash_bytes(b"texture bytes"));
    assert_eq!(curator.asset_dependency_hash(guid(1)), Ok(expected));
    // No references: the reference hash is the dependency hash.
    assert_eq!(curator.asset_reference_hash(guid(1)), Ok(expected));
}

#[test]
fn hashes_are_deterministic_across_curators() {
    let project = TestProject::new();
    project.write("tex.png", b"texture");
    project.write("normal.png", b"normals");
    let base = project.write_asset("base.asset", guid(1), 3, &["tex.png", "normal.png"], &[]);
    let top = project.write_asset("top.asset", guid(2), 9, &[&guid(1).to_string()], &["normal.png"]);

    let hashes = |curator: &asset_curator::Curator| {
        curator.ensure_updated(&base).unwrap();
        curator.ensure_updated(&top).unwrap();
        (
            curator.asset_dependency_hash(guid(2)).unwrap(),
            curator.asset_reference_hash(guid(2)).unwrap(),
        )
    };
    let first = hashes(&project.curator());
    let second = hashes(&project.curator());
    assert_eq!(first, second);
    assert_ne!(first.0, first.1);
}

#[test]
fn guid_dependency_folds_in_its_hash() {
    let project = TestProject::new();
    project.write("tex.png", b"texture");
    let base = project.write_asset("base.asset", guid(1), 3, &["tex.png"], &[]);
    let top = project.write_asset("top.asset", guid(2), 9, &[&guid(1).to_string()], &[]);
    let curator = project.curator();
    curator.ensure_updated(&base).unwrap();
    curator.ensure_updated(&top).unwrap();

    let base_hash = curator.asset_dependency_hash(guid(1)).unwrap();
    assert_eq!(curator.asset_dependency_hash(guid(2)), Ok(combine_hash(9, base_hash)));
}

#[test]
fn changed_input_invalidates_and_changes_hash() {
    let project = TestProject::new();
    let tex = project.write("tex.png", b"v1");
    let path = project.write_asset("a.asset", guid(1), 0, &["tex.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    let before = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(before.state, TransformState::NeedsTransform);

    project.write("tex.png", b"v2");
    curator.handle_file_change(&tex).unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::Unknown));

    let after = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_ne!(before.asset_hash, after.asset_hash);
    assert_eq!(after.asset_hash, Some(combine_hash(0, hash_bytes(b"v2"))));
}

#[test]
fn invalidation_reaches_transitive_users() {
    let project = TestProject::new();
    let tex = project.write("tex.png", b"v1");
    let base = project.write_asset("base.asset", guid(1), 0, &["tex.png"], &[]);
    let mid = project.write_asset("mid.asset", guid(2), 0, &[&guid(1).to_string()], &[]);
    let top = project.write_asset("top.asset", guid(3), 0, &[], &[&guid(2).to_string()]);
    let curator = project.curator();
    for path in [&base, &mid, &top] {
        curator.ensure_updated(path).unwrap();
    }
    curator.process_pending_updates();
    for n in 1..=3 {
        assert_ne!(curator.transform_state(guid(n)), Some(TransformState::Unknown));
    }

    project.write("tex.png", b"v2");
    curator.handle_file_change(&tex).unwrap();
    for n in 1..=3 {
        assert_eq!(curator.transform_state(guid(n)), Some(TransformState::Unknown));
    }
    assert!(curator.pending_updates() >= 3);
    curator.process_pending_updates();
    assert_eq!(curator.pending_updates(), 0);
}

#[test]
fn missing_file_dependency_heals_when_created() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 0, &["later.png"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();

    let status = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(status.state, TransformState::MissingTransformDependency);
    assert_eq!(status.asset_hash, None);
    let info = curator.asset_info(guid(1)).unwrap();
    assert!(info.missing_dependencies().contains("later.png"));
    match curator.asset_dependency_hash(guid(1)) {
        Err(HashError::MissingDependencies { dependencies, .. }) => {
            assert!(dependencies.contains("later.png"))
        }
        other => panic!("unexpected {other:?}"),
    }

    let later = project.write("later.png", b"here now");
    curator.handle_file_change(&later).unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::Unknown));

    let status = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(status.state, TransformState::NeedsTransform);
    assert!(curator.asset_info(guid(1)).unwrap().missing_dependencies().is_empty());
}

#[test]
fn unknown_guid_dependency_resolves_when_asset_appears() {
    let project = TestProject::new();
    let user = project.write_asset("user.asset", guid(1), 0, &[&guid(2).to_string()], &[]);
    let curator = project.curator();
    curator.ensure_updated(&user).unwrap();
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::MissingTransformDependency
    );

    let target = project.write_asset("target.asset", guid(2), 0, &[], &[]);
    curator.handle_file_change(&target).unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::Unknown));
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::NeedsTransform
    );
}

#[test]
fn transform_cycle_is_reported() {
    let project = TestProject::new();
    let a = project.write_asset("a.asset", guid(1), 0, &[&guid(2).to_string()], &[]);
    let b = project.write_asset("b.asset", guid(2), 0, &[&guid(1).to_string()], &[]);
    let curator = project.curator();
    curator.ensure_updated(&a).unwrap();
    curator.ensure_updated(&b).unwrap();

    assert_eq!(
        curator.asset_dependency_hash(guid(1)),
        Err(HashError::CircularDependency { guid: guid(1) })
    );
    let status = curator.is_asset_up_to_date(guid(1), None, false).unwrap();
    assert_eq!(status.state, TransformState::CircularDependency);
    assert_eq!(curator.transform_state(guid(2)), Some(TransformState::CircularDependency));

    // Terminates even though every invalidation loops back.
    curator.notify_of_asset_change(guid(2));
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::Unknown));
    curator.process_pending_updates();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::CircularDependency));
}

#[test]
fn cycle_membership_does_not_depend_on_start() {
    // 1 -> {2, 3}, 2 -> 1, 3 -> 2: all three sit on a cycle, 4 only uses it.
    let project = TestProject::new();
    let paths = [
        project.write_asset("s.asset", guid(1), 0, &[&guid(2).to_string(), &guid(3).to_string()], &[]),
        project.write_asset("m.asset", guid(2), 0, &[&guid(1).to_string()], &[]),
        project.write_asset("b.asset", guid(3), 0, &[&guid(2).to_string()], &[]),
        project.write_asset("x.asset", guid(4), 0, &[&guid(1).to_string()], &[]),
    ];

    for start in [guid(1), guid(3), guid(2), guid(4)] {
        let curator = project.curator();
        for path in &paths {
            curator.ensure_updated(path).unwrap();
        }
        let _ = curator.asset_dependency_hash(start);
        for member in [guid(1), guid(2), guid(3)] {
            assert_eq!(
                curator.asset_dependency_hash(member),
                Err(HashError::CircularDependency { guid: member }),
                "starting at {start}"
            );
            assert_eq!(
                curator.transform_state(member),
                Some(TransformState::CircularDependency),
                "starting at {start}"
            );
        }
        assert!(matches!(
            curator.asset_dependency_hash(guid(4)),
            Err(HashError::MissingDependencies { .. })
        ));
        assert_eq!(
            curator.transform_state(guid(4)),
            Some(TransformState::MissingTransformDependency)
        );
    }
}

#[test]
fn reference_cycles_are_allowed() {
    let project = TestProject::new();
    let a = project.write_asset("a.asset", guid(1), 1, &[], &[&guid(2).to_string()]);
    let b = project.write_asset("b.asset", guid(2), 2, &[], &[&guid(1).to_string()]);
    let curator = project.curator();
    curator.ensure_updated(&a).unwrap();
    curator.ensure_updated(&b).unwrap();

    assert_eq!(curator.asset_dependency_hash(guid(1)), Ok(1));
    assert_eq!(curator.asset_reference_hash(guid(1)), Ok(combine_hash(1, 2)));
    assert_eq!(curator.asset_reference_hash(guid(2)), Ok(combine_hash(2, 1)));
    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::NeedsTransform
    );
}

#[test]
fn missing_reference_depends_on_thumbnail_support() {
    let project = TestProject::new();
    let plain = project.write_asset("plain.asset", guid(1), 0, &[], &["gone.png"]);
    let mesh = asset_curator::DocumentInfo::new(guid(2), "Mesh").with_reference("gone.png");
    let mesh = project.write_document("thing.mesh", &mesh);
    let curator = project.curator();
    curator.ensure_updated(&plain).unwrap();
    curator.ensure_updated(&mesh).unwrap();

    assert_eq!(
        curator.is_asset_up_to_date(guid(1), None, false).unwrap().state,
        TransformState::MissingPackageDependency
    );
    assert_eq!(
        curator.is_asset_up_to_date(guid(2), None, false).unwrap().state,
        TransformState::MissingThumbnailDependency
    );
    assert!(curator.asset_dependency_hash(guid(1)).is_ok());
    assert!(curator
        .asset_info(guid(2))
        .unwrap()
        .missing_references()
        .contains("gone.png"));
}

#[test]
fn virtual_dependencies_are_ignored() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 5, &["red.color"], &[]);
    let curator = project.curator();
    curator.ensure_updated(&path).unwrap();
    assert_eq!(curator.asset_dependency_hash(guid(1)), Ok(5));
}

#[test]
fn profile_settings_change_every_hash() {
    let project = TestProject::new();
    let path = project.write_asset("a.asset", guid(1), 5, &[], &[]);
    let config = project
        .config()
        .with_profile(asset_curator::AssetProfile::new("Console", 100));
    let curator = asset_curator::Curator::new(config, common::default_managers()).unwrap();
    curator.ensure_updated(&path).unwrap();
    assert_eq!(curator.asset_dependency_hash(guid(1)), Ok(5));

    curator.set_active_profile("Console").unwrap();
    assert_eq!(curator.transform_state(guid(1)), Some(TransformState::Unknown));
    assert_eq!(curator.asset_dependency_hash(guid(1)), Ok(105));
}
