//! Scan a project, settle every transform state and print statistics.
//!
//! ```text
//! curator_scan <data-dir>... [--config FILE] [--profile NAME] [--cache FILE]
//!              [--transform] [--trace FILE]
//! ```
//!
//! Assets are JSON documents with the `.asset` extension.

use asset_curator::logging::{init_file_logging, init_logging};
use asset_curator::{
    Curator, CuratorConfig, JsonAssetManager, ManagerRegistry, TransformFlags, TransformState,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Default)]
struct Args {
    data_directories: Vec<PathBuf>,
    config: Option<PathBuf>,
    profile: Option<String>,
    cache: Option<PathBuf>,
    trace: Option<PathBuf>,
    transform: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| iter.next().ok_or_else(|| format!("{name} expects a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value("--config")?.into()),
            "--profile" => args.profile = Some(value("--profile")?),
            "--cache" => args.cache = Some(value("--cache")?.into()),
            "--trace" => args.trace = Some(value("--trace")?.into()),
            "--transform" => args.transform = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            dir => args.data_directories.push(dir.into()),
        }
    }
    if args.data_directories.is_empty() && args.config.is_none() {
        return Err("no data directory given".into());
    }
    Ok(args)
}

fn run(args: Args) -> asset_curator::Result<bool> {
    let mut config = match &args.config {
        Some(path) => CuratorConfig::from_json_file(path)?,
        None => CuratorConfig::new(),
    };
    for dir in args.data_directories {
        config = config.with_data_directory(std::fs::canonicalize(&dir)?);
    }
    if let Some(cache) = args.cache {
        config = config.with_cache_file(cache);
    }

    let mut managers = ManagerRegistry::new();
    managers.register(JsonAssetManager::new("Asset", &["asset"]).with_thumbnails(true));

    let curator = Curator::new(config, managers)?;
    if curator.config().cache_file.is_some() {
        let restored = curator.load_caches(None)?;
        println!("Restored {restored} cache entries");
    }
    if let Some(profile) = &args.profile {
        curator.set_active_profile(profile)?;
    }

    let start = Instant::now();
    let scan = curator.check_file_system();
    let updated = curator.process_pending_updates();
    curator.tick();
    println!(
        "Scanned {} files, {} assets, {updated} state updates in {:?}",
        scan.files,
        scan.assets,
        start.elapsed()
    );

    if args.transform {
        let summary = curator.transform_all_assets(TransformFlags::default(), None);
        for (guid, err) in &summary.failed {
            println!("  {guid}: {err}");
        }
        println!(
            "Transformed {}, up to date {}, failed {}",
            summary.transformed,
            summary.up_to_date,
            summary.failed.len()
        );
        curator.process_pending_updates();
    }

    let stats = curator.transform_stats();
    for state in TransformState::ALL {
        let count = stats.count(state);
        if count > 0 {
            println!("{state:>28?}: {count}");
        }
    }

    if curator.config().cache_file.is_some() {
        curator.save_caches(None)?;
    }
    Ok(stats.count(TransformState::UpToDate) == stats.num_assets)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("curator_scan: {err}");
            return ExitCode::from(2);
        }
    };

    let logging = match &args.trace {
        Some(path) => init_file_logging(path, "asset_curator=trace").map(Some),
        None => init_logging("asset_curator=info").map(|_| None),
    };
    let _guard = match logging {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("curator_scan: failed to set up logging: {err}");
            None
        }
    };

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("curator_scan: {err}");
            ExitCode::from(2)
        }
    }
}
