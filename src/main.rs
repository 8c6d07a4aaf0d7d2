use alphaplay::cli::{Args, CacheAction, Command};
use alphaplay::config::{LifecycleCallbacks, LocalFile, LoopCount, PlaybackConfig, PlaybackOptions, ResourceSource};
use alphaplay::core::cache_store::CacheStore;
use alphaplay::core::disk_cache::DiskCacheStore;
use alphaplay::core::event_bus::EventBus;
use alphaplay::core::fetcher::HttpFetcher;
use alphaplay::core::metadata::NullDecoder;
use alphaplay::core::object_url::ObjectUrlRegistry;
use alphaplay::core::prefetch::{PrefetchRequest, Prefetcher};
use alphaplay::core::session::{Collaborators, Session};
use alphaplay::core::traits::MediaElement;
use alphaplay::core::workers::{self, Epoch, InlinePool};
use alphaplay::headless::{HeadlessMedia, HeadlessRendererFactory, TimerFrameSource};
use alphaplay::paths::{self, PathConfig};
use alphaplay::error::PlaybackError;
use alphaplay::platform::PlatformProfile;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// URL, or a local file when the path exists
fn parse_source(raw: &str) -> ResourceSource {
    let is_url = raw.starts_with("http://") || raw.starts_with("https://");
    if !is_url && Path::new(raw).exists() {
        ResourceSource::File(LocalFile::from_path(raw))
    } else {
        ResourceSource::Url(raw.to_string())
    }
}

fn open_store(path_config: &PathConfig) -> Result<DiskCacheStore> {
    let dir = paths::cache_dir(path_config);
    paths::ensure_dir(&dir)?;
    DiskCacheStore::open(&dir).with_context(|| format!("Failed to open cache: {}", dir.display()))
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::cache_dir(path_config).join("alphaplay.log"));
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            paths::ensure_dir(parent)?;
        }
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("ureq", log::LevelFilter::Info)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("ureq", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn run_prefetch(path_config: &PathConfig, raw: &str, force: bool) -> Result<()> {
    let store = Arc::new(open_store(path_config)?);
    let source = parse_source(raw);
    let identity = source.identity().to_string();
    if force && store.remove(&identity)? {
        info!("Dropped cached copy of {}", identity);
    }

    let objects = ObjectUrlRegistry::new();
    let prefetcher = Prefetcher::new(
        Arc::new(HttpFetcher::default()),
        store.clone(),
        Arc::new(NullDecoder),
        objects.clone(),
        Arc::new(InlinePool),
    );
    let request = PrefetchRequest {
        source,
        use_byte_cache: true,
        use_metadata: true,
        avoid_object_url: false,
    };
    let started = Instant::now();
    let prefetched = prefetcher
        .prefetch(&request, &Epoch::new().ticket())?
        .context("Prefetch abandoned")?;

    let size = prefetched.reference.as_ref().map(|r| r.len()).unwrap_or(0);
    println!(
        "{} {} ({} bytes, {:.0?})",
        if prefetched.from_cache { "cached" } else { "fetched" },
        identity,
        size,
        started.elapsed()
    );
    if let Some(reference) = prefetched.reference {
        objects.revoke(reference);
    }
    let stats = store.stats_snapshot();
    info!("Cache now holds {} entries ({} bytes)", stats.entries, stats.bytes);
    Ok(())
}

fn run_cache(path_config: &PathConfig, action: &CacheAction) -> Result<()> {
    let store = open_store(path_config)?;
    match action {
        CacheAction::List => {
            let entries = store.list();
            for entry in &entries {
                let meta = if entry.metadata.is_some() { "meta" } else { "-" };
                println!("{:>12}  {:<4}  {}", entry.size, meta, entry.key);
            }
            let stats = store.stats_snapshot();
            println!("{} entries, {} bytes in {}", stats.entries, stats.bytes, store.dir().display());
        }
        CacheAction::Clear => {
            let removed = store.clear()?;
            println!("Removed {} entries", removed);
        }
        CacheAction::Remove { key } => {
            if store.remove(key)? {
                println!("Removed {}", key);
            } else {
                bail!("Not cached: {}", key);
            }
        }
    }
    Ok(())
}

struct SimulateArgs<'a> {
    source: &'a str,
    options: Option<&'a PathBuf>,
    loop_count: Option<i64>,
    duration: f64,
    fps: f64,
    block_autoplay: bool,
    platform: Option<&'a PathBuf>,
    timeout: f64,
}

fn load_options(explicit: Option<&PathBuf>) -> Result<PlaybackOptions> {
    if let Some(path) = explicit {
        return PlaybackOptions::from_json_file(path);
    }
    let default_path = paths::options_file();
    if default_path.exists() {
        info!("Using options from {}", default_path.display());
        return PlaybackOptions::from_json_file(&default_path);
    }
    Ok(PlaybackOptions::default())
}

fn load_platform(path: Option<&PathBuf>) -> Result<PlatformProfile> {
    let Some(path) = path else {
        return Ok(PlatformProfile::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read platform file: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse platform file: {}", path.display()))
}

fn run_simulate(path_config: &PathConfig, sim: SimulateArgs<'_>) -> Result<()> {
    let mut options = load_options(sim.options)?;
    if let Some(n) = sim.loop_count {
        options.loop_count = LoopCount::from_count(n);
    }
    let platform = load_platform(sim.platform)?;
    let store = Arc::new(open_store(path_config)?);

    let outcome: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let say = |tag: &'static str| Box::new(move || println!("[{}]", tag)) as Box<dyn FnMut()>;
    let end_outcome = Rc::clone(&outcome);
    let callbacks = LifecycleCallbacks {
        on_start: Some(say("start")),
        on_resume: Some(say("resume")),
        on_pause: Some(say("pause")),
        on_stop: Some(say("stop")),
        on_process: None,
        on_end: Some(Box::new(move |err: Option<&PlaybackError>| {
            match err {
                Some(e) => println!("[end] {}", e),
                None => println!("[end]"),
            }
            *end_outcome.borrow_mut() = err.map(|e| e.to_string());
        })),
        on_error: Some(Box::new(|err: &PlaybackError| {
            let tag = if err.is_fatal() { "fatal" } else { "error" };
            println!("[{}] {}", tag, err);
        })),
    };

    let bus = EventBus::new();
    let objects = ObjectUrlRegistry::new();
    let media = HeadlessMedia::new(bus.emitter(), objects.clone(), sim.duration)
        .with_autoplay_policy(!sim.block_autoplay, true);
    let factory = HeadlessRendererFactory::new(true);
    let rendered = factory.rendered();
    let frames_per_cycle = (sim.duration * sim.fps).round().max(1.0) as u32;
    let frames = TimerFrameSource::new(sim.fps, frames_per_cycle);

    let config = PlaybackConfig::new(parse_source(sim.source), "headless")
        .with_options(options)
        .with_callbacks(callbacks)
        .with_click_to_play(Box::new(|container: &str, media: &mut dyn MediaElement| {
            println!("[click-to-play] {}", container);
            media.attach_click_to_play(container);
        }));
    let collaborators = Collaborators::new(Box::new(media), Box::new(factory), Box::new(frames))
        .with_cache(store.clone())
        .with_pool(workers::shared_pool())
        .with_objects(objects)
        .with_platform(platform)
        .with_bus(bus);
    let mut session = Session::new(config, collaborators)?;
    debug!("Simulating {} ({})", session.identity(), session.render_mode());

    let started = Instant::now();
    let deadline = started + Duration::from_secs_f64(sim.timeout.max(0.1));
    session.setup();
    session.start();
    while !session.is_destroyed() {
        if Instant::now() >= deadline {
            session.destroy();
            bail!("Playback did not end within {:.1}s", sim.timeout);
        }
        session.update();
        std::thread::sleep(Duration::from_millis(2));
    }

    println!(
        "{} frames rendered in {:.2?} ({} cycles)",
        rendered.load(Ordering::Relaxed),
        started.elapsed(),
        session.loop_checker().cycles_completed()
    );
    let stats = store.stats_snapshot();
    println!(
        "cache: {} hits, {} misses ({:.0}% hit rate)",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
    if let Some(err) = outcome.borrow().as_ref() {
        bail!("Playback failed: {}", err);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path_config = PathConfig::from_env_and_cli(args.cache_dir.clone());
    init_logging(&args, &path_config)?;

    info!("alphaplay {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);
    info!("Cache path: {}", paths::cache_dir(&path_config).display());

    match &args.command {
        Command::Prefetch { source, force } => run_prefetch(&path_config, source, *force),
        Command::Cache { action } => run_cache(&path_config, action),
        Command::Simulate {
            source,
            options,
            loop_count,
            duration,
            fps,
            block_autoplay,
            platform,
            timeout,
        } => run_simulate(
            &path_config,
            SimulateArgs {
                source,
                options: options.as_ref(),
                loop_count: *loop_count,
                duration: *duration,
                fps: *fps,
                block_autoplay: *block_autoplay,
                platform: platform.as_ref(),
                timeout: *timeout,
            },
        ),
    }
}
