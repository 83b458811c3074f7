//! Serve command - preview server with rebuild on change

use std::{
    future::Future,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bindery_core::{Config, config::CONFIG_FILE};
use bindery_generator::{
    BuildStats, Builder, assets::STATIC_DIR, loader::CONTENT_DIR, template::TemplateCache,
};
use color_eyre::eyre::{Result, WrapErr, eyre};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{MetadataKind, ModifyKind},
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    time::{self, Instant},
};

use crate::server::{self, ReloadBroker};

/// Quiet period after the last change before a rebuild starts.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Project trees that trigger a rebuild when they change.
pub const WATCHED_DIRS: [&str; 3] = [CONTENT_DIR, TemplateCache::LAYOUTS_DIR, STATIC_DIR];

/// Rebuild scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing changed since the last build.
    Idle,
    /// Changes seen; a rebuild is due at the deadline.
    Pending,
    /// A rebuild is running.
    Rebuilding,
}

/// Collapses bursts of filesystem events into a single rebuild.
///
/// Every event pushes the deadline back instead of scheduling another build.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Create an idle debouncer.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
            deadline: None,
        }
    }

    /// Current scheduling state.
    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// When the pending rebuild is due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record a change at `now` and return the new deadline.
    pub fn trigger(&mut self, now: Instant) -> Instant {
        let deadline = now + self.delay;
        self.state = DebounceState::Pending;
        self.deadline = Some(deadline);
        deadline
    }

    /// Move from pending to rebuilding. Returns `false` when nothing is due.
    pub fn start_rebuild(&mut self) -> bool {
        if self.state != DebounceState::Pending {
            return false;
        }
        self.state = DebounceState::Rebuilding;
        self.deadline = None;
        true
    }

    /// The rebuild finished, successfully or not.
    pub fn finish(&mut self) {
        self.state = DebounceState::Idle;
    }
}

/// Run the serve command.
///
/// Builds the site into a temporary directory, serves it on `127.0.0.1` and
/// rebuilds whenever the project changes.
pub async fn run(root: &Path, port: u16, open_browser: bool) -> Result<()> {
    let root = root
        .canonicalize()
        .wrap_err_with(|| format!("Project directory not found: {}", root.display()))?;
    tracing::info!(root = %root.display(), port, "Starting preview server");

    // Fail early on unreadable settings; later rebuilds only log.
    Config::load_with_env(&root).wrap_err("Failed to load configuration")?;

    let output = tempfile::Builder::new()
        .prefix("bindery-")
        .tempdir()
        .wrap_err("Failed to create preview directory")?;
    let output_dir = output.path().to_path_buf();

    match rebuild(root.clone(), output_dir.clone()).await {
        Ok(stats) => print_build_stats(&stats),
        Err(e) => eprintln!("  ✗ Initial build failed: {e:#}"),
    }

    let broker = Arc::new(ReloadBroker::new());

    let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>(64);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.blocking_send(res);
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    watcher
        .watch(&root, RecursiveMode::NonRecursive)
        .wrap_err("Failed to watch project directory")?;
    for dir in WATCHED_DIRS {
        let path = root.join(dir);
        if path.is_dir() {
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .wrap_err_with(|| format!("Failed to watch {}", path.display()))?;
            tracing::debug!(dir = %path.display(), "watching");
        }
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    let rebuild_root = root.clone();
    let rebuild_output = output_dir.clone();
    let watch_task = tokio::spawn(watch_loop(
        WatchSession {
            root: root.clone(),
            broker: Arc::clone(&broker),
            delay: DEBOUNCE,
        },
        event_rx,
        stop_rx,
        move |dir: &Path| watcher.watch(dir, RecursiveMode::Recursive),
        move || rebuild(rebuild_root.clone(), rebuild_output.clone()),
    ));

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    let url = format!("http://{addr}");
    println!();
    println!("  Preview server running at {url}");
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    let app = server::router(&output_dir, Arc::clone(&broker));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(broker, stop_tx))
        .await
        .wrap_err("Server error")?;

    if let Err(e) = watch_task.await {
        tracing::warn!(error = %e, "watcher task failed");
    }
    tracing::info!("Preview server stopped");

    drop(output);
    Ok(())
}

/// Wait for Ctrl-C, then close live reload streams and stop the watcher so
/// the server can drain.
async fn shutdown_signal(broker: Arc<ReloadBroker>, stop: oneshot::Sender<()>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }
    println!();
    println!("  Shutting down...");
    broker.close_all();
    let _ = stop.send(());
}

/// Shared inputs of the watch loop.
struct WatchSession {
    root: PathBuf,
    broker: Arc<ReloadBroker>,
    delay: Duration,
}

/// Debounce watcher events and rebuild until stopped or until the event
/// channel closes.
///
/// `watch_dir` adds a newly created directory to the watch set; `rebuild`
/// runs one build. Clients are signalled only after a successful build.
async fn watch_loop<W, R, F>(
    session: WatchSession,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    mut stop: oneshot::Receiver<()>,
    mut watch_dir: W,
    mut rebuild: R,
) where
    W: FnMut(&Path) -> notify::Result<()>,
    R: FnMut() -> F,
    F: Future<Output = Result<BuildStats>>,
{
    let WatchSession {
        root,
        broker,
        delay,
    } = session;
    let mut debouncer = Debouncer::new(delay);
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "watch error");
                        continue;
                    }
                };
                if !triggers_rebuild(&event, &root) {
                    continue;
                }
                watch_created_dirs(&mut watch_dir, &event);
                tracing::debug!(paths = ?event.paths, "change detected");
                let deadline = debouncer.trigger(Instant::now());
                sleep.as_mut().reset(deadline);
            }
            () = &mut sleep, if debouncer.state() == DebounceState::Pending => {
                if !debouncer.start_rebuild() {
                    continue;
                }
                println!("  File change detected, rebuilding...");
                match rebuild().await {
                    Ok(stats) => {
                        println!("  ✓ Rebuilt {} posts in {}ms", stats.posts, stats.duration_ms);
                        broker.broadcast();
                    }
                    Err(e) => {
                        tracing::error!(error = %format!("{e:#}"), "rebuild failed");
                        eprintln!("  ✗ Rebuild failed: {e:#}");
                    }
                }
                debouncer.finish();
            }
        }
    }

    tracing::debug!("watcher stopped");
}

/// Build the preview site off the async runtime and inject the live reload
/// script into its pages.
async fn rebuild(root: PathBuf, output_dir: PathBuf) -> Result<BuildStats> {
    tokio::task::spawn_blocking(move || -> Result<BuildStats> {
        let config = Config::load_with_env(&root)
            .wrap_err("Failed to load configuration")?
            .preview();
        let stats = Builder::new(config, &root, &output_dir)
            .build()
            .wrap_err("Build failed")?;
        let injected = server::inject_livereload_into_dir(&output_dir)
            .wrap_err("Failed to inject live reload script")?;
        tracing::debug!(injected, "live reload script injected");
        Ok(stats)
    })
    .await
    .map_err(|e| eyre!("rebuild task panicked: {e}"))?
}

/// Whether an event should schedule a rebuild.
///
/// Reads and permission-only changes are ignored, as is anything outside the
/// watched trees and the settings file.
pub fn triggers_rebuild(event: &Event, root: &Path) -> bool {
    match event.kind {
        EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions | MetadataKind::Ownership | MetadataKind::Any,
        )) => false,
        _ => event.paths.iter().any(|path| is_watched_path(root, path)),
    }
}

/// Whether a path lies in a watched tree or is the settings file.
pub fn is_watched_path(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let mut components = relative.components();
    let Some(Component::Normal(first)) = components.next() else {
        return false;
    };
    let is_settings = first == CONFIG_FILE && components.next().is_none();
    is_settings || WATCHED_DIRS.iter().any(|dir| first == *dir)
}

fn watch_created_dirs<W>(watch_dir: &mut W, event: &Event)
where
    W: FnMut(&Path) -> notify::Result<()>,
{
    if !matches!(event.kind, EventKind::Create(_)) {
        return;
    }
    for path in event.paths.iter().filter(|path| path.is_dir()) {
        match watch_dir(path) {
            Ok(()) => tracing::debug!(dir = %path.display(), "watching new directory"),
            Err(e) => tracing::warn!(dir = %path.display(), error = %e, "could not watch directory"),
        }
    }
}

fn print_build_stats(stats: &BuildStats) {
    println!();
    println!("  Build Statistics:");
    println!("  ─────────────────────────────────");
    println!("  Posts:        {:>6}", stats.posts);
    println!("  Pages:        {:>6}", stats.pages);
    println!("  Tags:         {:>6}", stats.tags);
    println!("  Assets:       {:>6}", stats.assets);
    println!("  ─────────────────────────────────");
    println!("  Duration:     {:>6}ms", stats.duration_ms);
}
