//! The mock server handle.
//!
//! Building a [`MockServer`] binds the listener and spawns the axum server
//! in one step, so a handle is always backed by a running server. The server
//! stops on [`MockServer::stop`], [`MockServer::shutdown`] or when the handle
//! is dropped.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::MockServerConfig;
use crate::error::{MockServerError, VerificationError};
use crate::extension::{self, ResponseTransformer};
use crate::journal::{LoggedRequest, RequestJournal};
use crate::near_miss::{find_near_misses, NearMiss};
use crate::stub::{ResponseDefinition, StubMapping};

/// How long `stop` waits for open connections before aborting the server.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// State shared between the handle and the request handler.
struct ServerState {
    stubs: RwLock<Vec<StubMapping>>,
    journal: Mutex<RequestJournal>,
    /// Empty when extensions are disabled.
    transformers: Vec<Arc<dyn ResponseTransformer>>,
}

impl ServerState {
    fn stubs(&self) -> RwLockReadGuard<'_, Vec<StubMapping>> {
        self.stubs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn stubs_mut(&self) -> RwLockWriteGuard<'_, Vec<StubMapping>> {
        self.stubs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn journal(&self) -> MutexGuard<'_, RequestJournal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for a [`MockServer`], for callers that bring their own listener.
#[derive(Debug, Default)]
pub struct MockServerBuilder {
    config: MockServerConfig,
    listener: Option<std::net::TcpListener>,
}

impl MockServerBuilder {
    pub fn config(mut self, config: MockServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve on an already bound listener; host and port from the config are ignored.
    pub fn listener(mut self, listener: std::net::TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Bind (unless a listener was given) and start serving.
    pub async fn start(self) -> Result<MockServer, MockServerError> {
        let listener = match self.listener {
            Some(listener) => {
                listener.set_nonblocking(true)?;
                TcpListener::from_std(listener)?
            }
            None => {
                let addr = SocketAddr::new(self.config.host, self.config.port.unwrap_or(0));
                TcpListener::bind(addr)
                    .await
                    .map_err(|e| MockServerError::bind(addr, e))?
            }
        };
        let addr = listener.local_addr()?;

        let transformers = if self.config.extensions_enabled {
            self.config.extensions
        } else {
            Vec::new()
        };
        let state = Arc::new(ServerState {
            stubs: RwLock::new(Vec::new()),
            journal: Mutex::new(RequestJournal::new(self.config.max_request_journal_entries)),
            transformers,
        });

        let router = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Mock server exited with error");
            }
        });

        tracing::info!(
            %addr,
            extensions = state.transformers.len(),
            journal_limit = ?self.config.max_request_journal_entries,
            "Mock server listening"
        );

        Ok(MockServer {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle owning one running stub server.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Start a server with the default configuration.
    pub async fn start() -> Result<Self, MockServerError> {
        Self::builder().start().await
    }

    /// Start a server with the given configuration.
    pub async fn start_with(config: MockServerConfig) -> Result<Self, MockServerError> {
        Self::builder().config(config).start().await
    }

    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Port the server is bound to.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url())
        } else {
            format!("{}/{path}", self.base_url())
        }
    }

    /// Register a stub, returning the stored mapping.
    ///
    /// Registering a mapping whose id is already present replaces the stored
    /// copy in place, so ids stay unique.
    pub fn register(&self, stub: StubMapping) -> StubMapping {
        let mut stubs = self.state.stubs_mut();
        match stubs.iter_mut().find(|existing| existing.id() == stub.id()) {
            Some(existing) => {
                tracing::debug!(stub = %stub, "Replacing stub");
                *existing = stub.clone();
            }
            None => {
                tracing::debug!(stub = %stub, "Registering stub");
                stubs.push(stub.clone());
            }
        }
        stub
    }

    /// Currently registered stubs, in registration order.
    pub fn stubs(&self) -> Vec<StubMapping> {
        self.state.stubs().clone()
    }

    /// Remove one stub. Returns `false` if it was not registered.
    pub fn reset_stub(&self, stub: &StubMapping) -> bool {
        self.reset_stub_by_id(stub.id())
    }

    pub fn reset_stub_by_id(&self, id: Uuid) -> bool {
        let mut stubs = self.state.stubs_mut();
        match stubs.iter().position(|stub| stub.id() == id) {
            Some(index) => {
                stubs.remove(index);
                tracing::debug!(stub_id = %id, "Removed stub");
                true
            }
            None => false,
        }
    }

    /// Remove every stub. The journal is left untouched.
    pub fn reset_all_stubs(&self) {
        self.state.stubs_mut().clear();
        tracing::debug!("Removed all stubs");
    }

    /// Forget every journaled request.
    pub fn reset_requests(&self) {
        self.state.journal().clear();
    }

    /// Remove every stub and forget every request.
    pub fn reset(&self) {
        self.reset_all_stubs();
        self.reset_requests();
    }

    /// Journaled requests, oldest first.
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.journal().all()
    }

    /// Journaled requests no stub matched, oldest first.
    pub fn unmatched_requests(&self) -> Vec<LoggedRequest> {
        self.state.journal().unmatched()
    }

    /// Stubs that came close to matching `request`, closest first.
    pub fn find_near_misses_for(&self, request: &LoggedRequest) -> Vec<NearMiss> {
        find_near_misses(request, &self.state.stubs())
    }

    /// Fail if any journaled request matched no stub.
    ///
    /// The error carries near-miss suggestions when at least one stub came
    /// close, otherwise the raw list of unmatched requests.
    pub fn verify_no_unmatched_requests(&self) -> Result<(), VerificationError> {
        let unmatched = self.unmatched_requests();
        if unmatched.is_empty() {
            return Ok(());
        }

        let stubs = self.state.stubs();
        let near_misses: Vec<NearMiss> = unmatched
            .iter()
            .flat_map(|request| find_near_misses(request, &stubs))
            .collect();
        drop(stubs);

        if near_misses.is_empty() {
            Err(VerificationError::UnmatchedRequests(unmatched))
        } else {
            Err(VerificationError::NearMisses {
                near_misses,
                unmatched,
            })
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop serving. Open connections get a short grace period.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                tracing::debug!(addr = %self.addr, "Connections still open, aborting mock server");
                task.abort();
                let _ = task.await;
            }
            tracing::info!(addr = %self.addr, "Mock server stopped");
        }
    }

    /// Stop serving and release the handle.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer")
            .field("addr", &self.addr)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Lowest priority number wins; ties go to the most recently registered stub.
fn select_stub<'a>(stubs: &'a [StubMapping], request: &LoggedRequest) -> Option<&'a StubMapping> {
    stubs
        .iter()
        .rev()
        .filter(|stub| stub.request().matches(request))
        .min_by_key(|stub| stub.priority())
}

enum Outcome {
    Matched(Uuid, ResponseDefinition),
    Unmatched(Option<NearMiss>),
}

fn route(state: &ServerState, request: &LoggedRequest) -> Outcome {
    let stubs = state.stubs();
    match select_stub(&stubs, request) {
        Some(stub) => Outcome::Matched(stub.id(), stub.response().clone()),
        None => Outcome::Unmatched(find_near_misses(request, &stubs).into_iter().next()),
    }
}

async fn handle_request(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let mut request = LoggedRequest::new(method, url)
        .with_headers(headers)
        .with_body(body);

    match route(&state, &request) {
        Outcome::Matched(stub_id, response) => {
            request.matched_stub_id = Some(stub_id);
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                stub_id = %stub_id,
                "Request matched stub"
            );

            let response = extension::apply(&state.transformers, &request, response);
            state.journal().record(request);

            if let Some(delay) = response.delay() {
                tokio::time::sleep(delay).await;
            }
            response.into_response()
        }
        Outcome::Unmatched(near_miss) => {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                "Request was not matched"
            );

            let body = match near_miss {
                Some(near_miss) => format!("Request was not matched\n\n{near_miss}\n"),
                None => format!("Request was not matched\n\n{request}\n"),
            };
            state.journal().record(request);

            (StatusCode::NOT_FOUND, body).into_response()
        }
    }
}
