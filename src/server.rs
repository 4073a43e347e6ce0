//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Asking every open connection to finish its in-flight request and close.
//! 3. Waiting up to [`Timeouts::shutdown`] for that to happen, then aborting
//!    whatever is left.
//! 4. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Keep [`Timeouts::shutdown`] below `terminationGracePeriodSeconds`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::middleware::limits::DEADLINE_MESSAGE;
use crate::request::{BodyError, Request};
use crate::response::{self, Response};

/// How long past its deadline the chain may run before the server replaces
/// its reply.
const BACKSTOP_GRACE: Duration = Duration::from_secs(1);

/// Connection and lifecycle deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Reading the request head (HTTP/1) and collecting the body.
    pub read: Duration,
    /// Producing one response. Exceeded → `503` from the
    /// [`limits`](crate::middleware::limits) stage.
    pub write: Duration,
    /// A keep-alive connection with nothing in flight is closed after this.
    pub idle: Duration,
    /// Drain deadline after the shutdown signal.
    pub shutdown: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(15),
            write: Duration::from_secs(15),
            idle: Duration::from_secs(60),
            shutdown: Duration::from_secs(30),
        }
    }
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    timeouts: Timeouts,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use festivals_api::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 8080).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr, timeouts: Timeouts::default() }
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, app: BoxedHandler) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown<S>(self, app: BoxedHandler, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "festivals-api listening");

        let timeouts = self.timeouts;
        let (stop, stopping) = watch::channel(());
        let mut tasks = JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(serve_connection(stream, peer, Arc::clone(&app), timeouts, stopping.clone()));
                }

                // Reap finished connection tasks so the JoinSet stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        // Receivers only observe a send; the value carries nothing.
        let _ = stop.send(());

        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(timeouts.shutdown, drain).await.is_err() {
            warn!(remaining = tasks.len(), "shutdown deadline exceeded, aborting connections");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        info!("festivals-api stopped");
        Ok(())
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: BoxedHandler,
    timeouts: Timeouts,
    mut stopping: watch::Receiver<()>,
) {
    let activity = Arc::new(Activity::new());

    let svc = {
        let activity = Arc::clone(&activity);
        service_fn(move |req| {
            let app = Arc::clone(&app);
            let in_flight = activity.begin();
            async move {
                let res = dispatch(app, req, timeouts).await;
                drop(in_flight);
                res
            }
        })
    };

    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new()).header_read_timeout(timeouts.read);
    builder.http2().timer(TokioTimer::new());

    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(peer = %peer, "connection error: {e}");
                }
                return;
            }
            _ = stopping.changed() => {
                conn.as_mut().graceful_shutdown();
                break;
            }
            () = tokio::time::sleep_until(activity.idle_deadline(timeouts.idle)) => {
                if activity.is_idle(timeouts.idle) {
                    debug!(peer = %peer, "closing idle connection");
                    conn.as_mut().graceful_shutdown();
                    break;
                }
            }
        }
    }

    if let Err(e) = conn.await {
        debug!(peer = %peer, "connection error: {e}");
    }
}

/// Request bookkeeping for one connection's idle watchdog.
struct Activity {
    in_flight: AtomicUsize,
    last: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self { in_flight: AtomicUsize::new(0), last: Mutex::new(Instant::now()) }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    fn last(&self) -> Instant {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the connection would become idle if nothing else happens.
    fn idle_deadline(&self, idle: Duration) -> Instant {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            Instant::now() + idle
        } else {
            self.last() + idle
        }
    }

    fn is_idle(&self, idle: Duration) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.last().elapsed() >= idle
    }
}

struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.0.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Collects the body, records the request's limits in its context, and runs
/// the handler chain.
///
/// The [`limits`](crate::middleware::limits) stage turns a body failure or an
/// overrun deadline into a reply inside the chain. The server only steps in
/// when the chain itself overruns by [`BACKSTOP_GRACE`], which means the app
/// was built without that stage.
async fn dispatch(
    app: BoxedHandler,
    req: hyper::Request<Incoming>,
    timeouts: Timeouts,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let deadline = Instant::now() + timeouts.write;

    let (body, body_error) = match tokio::time::timeout(timeouts.read, body.collect()).await {
        Ok(Ok(collected)) => (collected.to_bytes(), None),
        Ok(Err(e)) => {
            debug!("failed to read request body: {e}");
            (Bytes::new(), Some(BodyError::Read))
        }
        Err(_) => {
            debug!("timed out reading request body");
            (Bytes::new(), Some(BodyError::Timeout))
        }
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let mut req = Request::new(parts, body);
    req.context_mut().set_deadline(deadline);
    if let Some(error) = body_error {
        req.context_mut().set_body_error(error);
    }

    let mut res = Response::new();
    if tokio::time::timeout_at(deadline + BACKSTOP_GRACE, app.call(req, &mut res)).await.is_err() {
        warn!(%method, %path, "handler chain ignored its deadline");
        let mut res = Response::new();
        response::text_error(&mut res, StatusCode::SERVICE_UNAVAILABLE, DEADLINE_MESSAGE);
        return Ok(res.into_http());
    }

    Ok(res.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available. A listener that cannot be installed
/// is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
