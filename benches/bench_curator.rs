//! Curator benchmarks: document updates and transitive hashing
//!
//! Run with: cargo bench --bench bench_curator

use asset_curator::{AssetGuid, Curator, CuratorConfig, JsonAssetManager, ManagerRegistry};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// `count` assets in a chain, each depending on the previous one and a texture
fn chain_project(count: usize) -> (TempDir, Curator, Vec<(AssetGuid, PathBuf)>) {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("Data");
    fs::create_dir_all(&data_dir).unwrap();

    let mut assets = Vec::with_capacity(count);
    let mut previous: Option<AssetGuid> = None;
    for i in 0..count {
        let texture = format!("tex{i}.png");
        fs::write(data_dir.join(&texture), vec![i as u8; 4096]).unwrap();

        let guid = AssetGuid::from_u128(0x1000 + i as u128);
        let mut dependencies = vec![format!("\"{texture}\"")];
        if let Some(previous) = previous {
            dependencies.push(format!("\"{previous}\""));
        }
        let document = format!(
            r#"{{ "guid": "{guid}", "settings_hash": {i}, "dependencies": [{}] }}"#,
            dependencies.join(", ")
        );
        let path = data_dir.join(format!("asset{i}.asset"));
        fs::write(&path, document).unwrap();
        assets.push((guid, path));
        previous = Some(guid);
    }

    let config = CuratorConfig::new().with_data_directory(&data_dir);
    let mut managers = ManagerRegistry::new();
    managers.register(JsonAssetManager::new("Asset", &["asset"]));
    let curator = Curator::new(config, managers).unwrap();
    curator.check_file_system();
    curator.process_pending_updates();
    (dir, curator, assets)
}

fn bench_ensure_updated(c: &mut Criterion) {
    let (_dir, curator, assets) = chain_project(200);
    c.bench_function("ensure_updated_unchanged_200", |b| {
        b.iter(|| {
            for (_, path) in &assets {
                black_box(curator.ensure_updated(path).unwrap());
            }
        });
    });
}

fn bench_transitive_hash(c: &mut Criterion) {
    let (_dir, curator, assets) = chain_project(200);
    let (root, _) = assets[assets.len() - 1];
    let (leaf, _) = assets[0];

    c.bench_function("dependency_hash_chain_200_cached", |b| {
        curator.asset_dependency_hash(root).unwrap();
        b.iter(|| black_box(curator.asset_dependency_hash(root).unwrap()));
    });

    c.bench_function("dependency_hash_chain_200_invalidated", |b| {
        b.iter(|| {
            curator.notify_of_asset_change(leaf);
            black_box(curator.is_asset_up_to_date(root, None, false).unwrap())
        });
    });

    c.bench_function("process_pending_updates_chain_200", |b| {
        b.iter(|| {
            curator.notify_of_asset_change(leaf);
            black_box(curator.process_pending_updates())
        });
    });
}

criterion_group!(benches, bench_ensure_updated, bench_transitive_hash);
criterion_main!(benches);
