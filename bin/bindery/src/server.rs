//! Preview server with live reload support.
//!
//! Serves the latest build output as static files and pushes a `reload`
//! event to every connected browser over Server-Sent Events.

use std::{
    collections::HashMap,
    convert::Infallible,
    fs,
    path::Path,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tracing::debug;
use walkdir::WalkDir;

/// Route of the live reload event stream.
pub const RELOAD_ROUTE: &str = "/__reload";

/// Data carried by every reload event.
pub const RELOAD_EVENT: &str = "reload";

/// Attribute identifying the injected live reload script.
pub const LIVERELOAD_MARKER: &str = "data-bindery-livereload";

/// Script injected before `</body>` of every served page.
pub const LIVERELOAD_SCRIPT: &str = r#"<script data-bindery-livereload>
(function () {
  var source = new EventSource("/__reload");
  source.onmessage = function (event) {
    if (event.data === "reload") {
      window.location.reload();
    }
  };
})();
</script>
"#;

#[derive(Debug, Default)]
struct Clients {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<()>>,
    closed: bool,
}

/// Registry of connected live-reload clients.
///
/// Each client owns a channel with room for a single pending signal, so a
/// slow client misses intermediate reloads instead of holding up the rest.
#[derive(Debug, Default)]
pub struct ReloadBroker {
    clients: Mutex<Clients>,
}

impl ReloadBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Clients> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a client. The client is removed when the subscription drops.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let mut clients = self.lock();
        let id = clients.next_id;
        clients.next_id += 1;
        if !clients.closed {
            clients.senders.insert(id, tx);
        }
        debug!(client = id, "live reload client connected");

        Subscription {
            broker: Arc::clone(self),
            id,
            rx,
        }
    }

    /// Signal every client without waiting on any of them.
    ///
    /// Returns the number of clients that received a fresh signal; clients
    /// whose slot is still full are skipped.
    pub fn broadcast(&self) -> usize {
        let mut clients = self.lock();
        let mut delivered = 0;
        clients.senders.retain(|_, tx| match tx.try_send(()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        });
        debug!(delivered, "broadcast reload");
        delivered
    }

    /// Drop every client channel, ending their event streams. Later
    /// subscriptions end immediately.
    pub fn close_all(&self) {
        let mut clients = self.lock();
        clients.closed = true;
        clients.senders.clear();
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.lock().senders.len()
    }

    fn unsubscribe(&self, id: u64) {
        if self.lock().senders.remove(&id).is_some() {
            debug!(client = id, "live reload client disconnected");
        }
    }
}

/// A registered client. Yields one item per received reload signal.
#[derive(Debug)]
pub struct Subscription {
    broker: Arc<ReloadBroker>,
    id: u64,
    rx: mpsc::Receiver<()>,
}

impl Stream for Subscription {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}

/// Create the preview server router.
pub fn router(output_dir: &Path, broker: Arc<ReloadBroker>) -> Router {
    Router::new()
        .route(RELOAD_ROUTE, get(reload_events))
        .fallback_service(ServeDir::new(output_dir))
        .with_state(broker)
}

async fn reload_events(
    State(broker): State<Arc<ReloadBroker>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = broker
        .subscribe()
        .map(|()| Ok(Event::default().data(RELOAD_EVENT)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Insert the live reload script before the closing body tag, or append it
/// when the page has none. Pages that already carry it are returned as is.
pub fn inject_livereload(html: &str) -> Option<String> {
    if html.contains(LIVERELOAD_MARKER) {
        return None;
    }
    let injected = match html.rfind("</body>") {
        Some(at) => format!("{}{LIVERELOAD_SCRIPT}{}", &html[..at], &html[at..]),
        None => format!("{html}{LIVERELOAD_SCRIPT}"),
    };
    Some(injected)
}

/// Inject the live reload script into every HTML file under `output_dir`.
///
/// Returns the number of files rewritten.
pub fn inject_livereload_into_dir(output_dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in WalkDir::new(output_dir) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }

        let html = fs::read_to_string(path)?;
        if let Some(injected) = inject_livereload(&html) {
            fs::write(path, injected)?;
            count += 1;
        }
    }
    Ok(count)
}
