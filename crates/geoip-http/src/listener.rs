//! Plain and TLS listener lifecycle.
//!
//! [`GeoIpServer::start`] binds the TLS listener first (when configured) and
//! then the plain listener. Each successful bind emits a `listening` event.
//! A bind failure only takes down that listener: it is recorded on the
//! returned [`RunningServer`] and never retried.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use geoip_core::{
    EventBus, EventSubscriber, GeoIpResult, GeoLocator, ListeningEvent, ServerConfig, ServerEvent,
};

use crate::service::{GeoIpHttpService, LookupDispatcher};
use crate::tls::{TlsError, load_server_config};

/// Time a client gets to complete the TLS handshake.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to bring up one listener.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TLS material could not be loaded.
    #[error("TLS listener disabled: {0}")]
    Tls(#[from] TlsError),
}

/// A configured GeoIP server, ready to start.
///
/// Subscribers registered before [`GeoIpServer::start`] see every
/// `listening` event; subscribers may also be added later.
pub struct GeoIpServer {
    config: Arc<ServerConfig>,
    dispatcher: Arc<LookupDispatcher>,
    events: Arc<EventBus>,
}

impl fmt::Debug for GeoIpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoIpServer")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl GeoIpServer {
    /// Validate `config` and build a server around `locator`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when [`ServerConfig::validate`] fails.
    pub fn new(config: ServerConfig, locator: Arc<dyn GeoLocator>) -> GeoIpResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let events = Arc::new(EventBus::new());
        let dispatcher = Arc::new(LookupDispatcher::new(
            Arc::clone(&config),
            locator,
            Arc::clone(&events),
        )?);

        if !config.auth_enabled() {
            warn!("no secret key configured, lookup requests are not authenticated");
        }

        Ok(Self {
            config,
            dispatcher,
            events,
        })
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The event bus `listening` and `lookup` events are published on.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Register an event subscriber.
    pub fn subscribe(&self, subscriber: impl EventSubscriber + 'static) {
        self.events.subscribe(subscriber);
    }

    /// The dispatcher as a hyper service, for mounting into another server.
    #[must_use]
    pub fn service(&self) -> GeoIpHttpService {
        GeoIpHttpService::new(Arc::clone(&self.dispatcher))
    }

    /// Bind the listeners and start serving.
    pub async fn start(&self) -> RunningServer {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut running = RunningServer {
            plain_addr: None,
            tls_addr: None,
            bind_errors: Vec::new(),
            shutdown_tx,
            tasks: Vec::new(),
        };

        if let Some(tls) = &self.config.tls {
            let bound = match load_server_config(tls) {
                Ok(tls_config) => self
                    .bind(tls.port, true)
                    .await
                    .map(|(listener, addr)| (listener, addr, TlsAcceptor::from(tls_config))),
                Err(e) => {
                    error!(error = %e, "failed to load TLS material");
                    Err(BindError::from(e))
                }
            };
            match bound {
                Ok((listener, addr, acceptor)) => {
                    running.tls_addr = Some(addr);
                    running.tasks.push(self.spawn(
                        listener,
                        addr,
                        Some(acceptor),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => running.bind_errors.push(e),
            }
        }

        match self.bind(self.config.listen_port, false).await {
            Ok((listener, addr)) => {
                running.plain_addr = Some(addr);
                running
                    .tasks
                    .push(self.spawn(listener, addr, None, shutdown_rx));
            }
            Err(e) => running.bind_errors.push(e),
        }

        running
    }

    async fn bind(&self, port: u16, uses_tls: bool) -> Result<(TcpListener, SocketAddr), BindError> {
        let host = self.config.listen_host.as_str();
        let addr = format!("{host}:{port}");
        let result = match TcpListener::bind((host, port)).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        result.map_err(|source| {
            error!(%addr, uses_tls, error = %source, "failed to bind listener");
            BindError::Bind { addr, source }
        })
    }

    fn spawn(
        &self,
        listener: TcpListener,
        addr: SocketAddr,
        acceptor: Option<TlsAcceptor>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let uses_tls = acceptor.is_some();
        debug!(%addr, uses_tls, "listener bound");
        self.events.emit(&ServerEvent::Listening(ListeningEvent {
            uses_tls,
            port: addr.port(),
            addr,
        }));
        tokio::spawn(serve(listener, self.service(), acceptor, shutdown))
    }
}

/// Handle to the listeners started by [`GeoIpServer::start`].
///
/// Dropping the handle stops accepting new connections.
#[derive(Debug)]
pub struct RunningServer {
    plain_addr: Option<SocketAddr>,
    tls_addr: Option<SocketAddr>,
    bind_errors: Vec<BindError>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Bound address of the plain listener.
    #[must_use]
    pub fn plain_addr(&self) -> Option<SocketAddr> {
        self.plain_addr
    }

    /// Bound address of the TLS listener.
    #[must_use]
    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls_addr
    }

    /// Listeners that failed to come up.
    #[must_use]
    pub fn bind_errors(&self) -> &[BindError] {
        &self.bind_errors
    }

    /// Whether at least one listener is serving.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Stop accepting connections and wait for in-flight requests to drain.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        self.wait().await;
    }

    /// Wait until every listener has stopped.
    pub async fn wait(self) {
        let Self {
            tasks, shutdown_tx, ..
        } = self;
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "listener task failed");
            }
        }
        drop(shutdown_tx);
    }
}

/// Run the accept loop, serving connections until shutdown is signalled.
async fn serve(
    listener: TcpListener,
    service: GeoIpHttpService,
    acceptor: Option<TlsAcceptor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.with_remote_addr(peer_addr);
                let http = http.clone();
                let watcher = graceful.watcher();
                let acceptor = acceptor.clone();
                let mut handshake_shutdown = shutdown.clone();

                tokio::spawn(async move {
                    let result = match acceptor {
                        Some(acceptor) => {
                            // A stalled handshake must not hold up draining.
                            let handshake =
                                tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream));
                            let tls_stream = tokio::select! {
                                result = handshake => match result {
                                    Ok(Ok(tls_stream)) => tls_stream,
                                    Ok(Err(e)) => {
                                        debug!(%peer_addr, error = %e, "TLS handshake failed");
                                        return;
                                    }
                                    Err(_) => {
                                        debug!(%peer_addr, "TLS handshake timed out");
                                        return;
                                    }
                                },
                                _ = handshake_shutdown.changed() => {
                                    debug!(%peer_addr, "shutdown during TLS handshake");
                                    return;
                                }
                            };
                            let conn = http.serve_connection(TokioIo::new(tls_stream), svc);
                            watcher.watch(conn.into_owned()).await
                        }
                        None => {
                            let conn = http.serve_connection(TokioIo::new(stream), svc);
                            watcher.watch(conn.into_owned()).await
                        }
                    };
                    if let Err(e) = result {
                        debug!(%peer_addr, error = %e, "connection error");
                    }
                });
            }

            _ = shutdown.changed() => {
                info!("shutting down listener, draining connections");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    debug!("all connections drained");
}
