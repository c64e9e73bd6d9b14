//! The embeddable server: lifecycle, registration and verification.

use super::handler::{handle_request, ServerState};
use super::shutdown::{drain, ShutdownTimeouts};
use crate::config::ServerConfig;
use crate::error::{ServerError, StubError, VerificationError};
use crate::request::{RecordedRequest, RequestMatch};
use crate::stub::{Responder, Stub, StubConfiguration};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// A running mock server bound to one address.
///
/// Dropping the handle without calling [`DecoyServer::shutdown`] stops the
/// accept loop and aborts open connections immediately.
pub struct DecoyServer {
    config: ServerConfig,
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<ShutdownTimeouts>>,
    accept_task: Option<JoinHandle<()>>,
}

impl DecoyServer {
    /// Binds the listener, registers the configured stubs and starts serving.
    ///
    /// Returns once the bound address is known, so `port()` is valid even
    /// when the config asked for port 0.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let state = Arc::new(ServerState::new(config.verbose, config.journal_mode));
        for definition in &config.stubs {
            state.registry().add(Arc::new(definition.build()?))?;
        }

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServerError::Bind(bind_addr.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(bind_addr, e))?;
        info!(
            "Server '{}' listening on {} with {} stubs",
            config.name,
            local_addr,
            state.registry().len()
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Ok(Self {
            config,
            state,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            accept_task: Some(accept_task),
        })
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://host:port` of the bound listener.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Registers a stub built from its parts.
    pub fn register(
        &self,
        configuration: StubConfiguration,
        specification: impl RequestMatch + 'static,
        responder: impl Responder + 'static,
    ) -> Result<Arc<Stub>, StubError> {
        let stub = Arc::new(Stub::new(configuration, specification, responder));
        self.add_stub(Arc::clone(&stub))?;
        Ok(stub)
    }

    pub fn add_stub(&self, stub: Arc<Stub>) -> Result<(), StubError> {
        if self.state.verbose() {
            debug!("Registering {}", stub.log_string());
        }
        self.state.registry().add(stub)
    }

    pub fn remove_stub(&self, stub: &Arc<Stub>) -> bool {
        self.state.registry().remove(stub)
    }

    /// Registered stubs in matching order.
    pub fn stubs(&self) -> Vec<Arc<Stub>> {
        self.state.registry().get_all().as_ref().clone()
    }

    /// Specifications of the stubs that have not matched any request yet.
    pub fn find_all_unmatched_stubs(&self) -> Vec<Arc<dyn RequestMatch>> {
        self.state
            .registry()
            .get_all()
            .iter()
            .filter(|stub| stub.match_count() == 0)
            .map(|stub| Arc::clone(stub.specification()))
            .collect()
    }

    pub fn find_all_unexpected_requests(&self) -> Arc<Vec<RecordedRequest>> {
        self.state.journal().unmatched()
    }

    /// Matched requests; always empty in lean journal mode.
    pub fn find_all_matched_requests(&self) -> Arc<Vec<RecordedRequest>> {
        self.state.journal().matched()
    }

    /// Zeroes every stub's match count and clears the journal.
    pub fn reset_match_counts(&self) {
        self.state.registry().reset_match_counts();
        self.state.journal().clear();
    }

    pub fn verify_no_unmatched_stubs(&self) -> Result<(), VerificationError> {
        let unmatched = self.find_all_unmatched_stubs();
        if unmatched.is_empty() {
            return Ok(());
        }
        Err(VerificationError::UnmatchedStubs(
            unmatched.iter().map(|spec| spec.describe()).collect(),
        ))
    }

    pub fn verify_no_unexpected_requests(&self) -> Result<(), VerificationError> {
        let unexpected = self.find_all_unexpected_requests();
        if unexpected.is_empty() {
            return Ok(());
        }
        Err(VerificationError::UnexpectedRequests(
            unexpected.iter().map(|request| request.to_string()).collect(),
        ))
    }

    /// Stops the server.
    ///
    /// The parameters are validated before anything is stopped; on error the
    /// server keeps running. Calling this on a stopped server is a no-op.
    pub async fn shutdown(
        &mut self,
        grace_period: Duration,
        timeout: Duration,
    ) -> Result<(), ServerError> {
        let timeouts = ShutdownTimeouts::new(grace_period, timeout)?;
        self.stop(timeouts).await;
        Ok(())
    }

    pub async fn shutdown_millis(
        &mut self,
        grace_period_ms: i64,
        timeout_ms: i64,
    ) -> Result<(), ServerError> {
        let timeouts = ShutdownTimeouts::from_millis(grace_period_ms, timeout_ms)?;
        self.stop(timeouts).await;
        Ok(())
    }

    /// Shuts down with a 500 ms grace period and a 1 s hard timeout.
    pub async fn shutdown_default(&mut self) {
        self.stop(ShutdownTimeouts::default()).await;
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    async fn stop(&mut self, timeouts: ShutdownTimeouts) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        info!(
            "Server '{}' shutting down (grace period {:?}, timeout {:?})",
            self.config.name,
            timeouts.grace_period(),
            timeouts.timeout()
        );
        let _ = shutdown_tx.send(timeouts);
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                error!("Accept loop of server '{}' failed: {}", self.config.name, e);
            }
        }
        info!("Server '{}' stopped", self.config.name);
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: oneshot::Receiver<ShutdownTimeouts>,
) {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    let timeouts = loop {
        tokio::select! {
            biased;
            signal = &mut shutdown_rx => {
                break signal.unwrap_or(ShutdownTimeouts::IMMEDIATE);
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));
                        let connection = graceful.watch(http1::Builder::new().serve_connection(io, service));
                        connections.spawn(async move {
                            if let Err(e) = connection.await {
                                debug!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    };

    drop(listener);
    drain(connections, graceful, timeouts).await;
}
