//! Interactive authorization code + PKCE login
//!
//! A short-lived axum listener on `localhost:<port>` drives the browser leg:
//! - `GET /login` draws a state value and PKCE verifier, seals both into the
//!   flow cookie and redirects to the identity provider.
//! - `GET /callback` checks the returned state against the cookie and hands
//!   the authorization code to the waiting flow. Exactly one successful
//!   callback is accepted; later ones get 410.
//!
//! The waiting side is bounded by a timeout. Whatever the outcome, the
//! listener is shut down before [`run`] returns.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

use crate::constants::{CALLBACK_PATH, FLOW_COOKIE, LISTENER_DRAIN_TIMEOUT, LOGIN_PATH};
use crate::cookie::{CookieKeys, FlowCookie, find_cookie};
use crate::error::{Error, Result};
use crate::pkce;
use crate::token::{self, Token};

/// Caller-supplied settings for one login.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Public client id. Falls back to the platform's discovered one.
    pub client_id: Option<String>,
    /// Fixed local port registered with the identity provider.
    pub port: u16,
    /// How long to wait for the browser to come back.
    pub timeout: Duration,
    /// Launch the system browser. The login URL is logged either way.
    pub open_browser: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            port: 9000,
            timeout: Duration::from_secs(300),
            open_browser: true,
        }
    }
}

/// Authorization code delivered by the callback.
#[derive(Debug)]
pub struct AuthorizationCode {
    pub code: String,
    pub verifier: String,
}

type CodeSender = oneshot::Sender<Result<AuthorizationCode>>;

/// Shared state of one login flow.
pub struct LoginFlow {
    keys: CookieKeys,
    client_id: String,
    authorization_endpoint: String,
    redirect_uri: String,
    sender: Mutex<Option<CodeSender>>,
}

impl LoginFlow {
    pub fn new(
        client_id: &str,
        authorization_endpoint: &str,
        redirect_uri: &str,
    ) -> (Arc<Self>, oneshot::Receiver<Result<AuthorizationCode>>) {
        let (tx, rx) = oneshot::channel();
        let flow = Arc::new(Self {
            keys: CookieKeys::generate(),
            client_id: client_id.to_owned(),
            authorization_endpoint: authorization_endpoint.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
            sender: Mutex::new(Some(tx)),
        });
        (flow, rx)
    }

    /// Hand the outcome to the waiting flow. False when already delivered.
    async fn deliver(&self, outcome: Result<AuthorizationCode>) -> bool {
        match self.sender.lock().await.take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    async fn is_complete(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

/// Build the callback listener's router.
pub fn callback_router(flow: Arc<LoginFlow>) -> Router {
    Router::new()
        .route(LOGIN_PATH, get(start_handler))
        .route(CALLBACK_PATH, get(callback_handler))
        .with_state(flow)
}

/// GET /login: set the flow cookie and redirect to the identity provider.
async fn start_handler(State(flow): State<Arc<LoginFlow>>) -> Response {
    let state = uuid::Uuid::new_v4().to_string();
    let verifier = pkce::generate_verifier();
    let challenge = pkce::compute_challenge(&verifier);

    let sealed = match flow.keys.seal(&FlowCookie {
        state: state.clone(),
        verifier,
    }) {
        Ok(sealed) => sealed,
        Err(e) => {
            error!(error = %e, "failed to seal login cookie");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let authorization_url = match pkce::build_authorization_url(
        &flow.authorization_endpoint,
        &flow.client_id,
        &flow.redirect_uri,
        &state,
        &challenge,
    ) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "failed to build authorization URL");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    debug!("redirecting browser to authorization endpoint");
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, authorization_url),
            (
                header::SET_COOKIE,
                format!("{FLOW_COOKIE}={sealed}; Path=/; HttpOnly; SameSite=Lax"),
            ),
        ],
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /callback: validate state and deliver the authorization code.
///
/// Requests that fail the state check are answered 400 without ending the
/// flow, so a stray or forged request cannot abort a real login. A provider
/// error is only honoured once the state matches.
async fn callback_handler(
    State(flow): State<Arc<LoginFlow>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    if flow.is_complete().await {
        return (StatusCode::GONE, "Login already completed.").into_response();
    }

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| find_cookie(v, FLOW_COOKIE));
    let Some(cookie) = cookie else {
        warn!("callback without login cookie");
        return (StatusCode::BAD_REQUEST, "Missing login state cookie.").into_response();
    };

    let flow_cookie = match flow.keys.open(cookie) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "callback with unreadable login cookie");
            return (StatusCode::BAD_REQUEST, "Invalid login state cookie.").into_response();
        }
    };

    if params.state.as_deref() != Some(flow_cookie.state.as_str()) {
        warn!("callback state does not match login cookie");
        return (StatusCode::BAD_REQUEST, "State mismatch.").into_response();
    }

    if let Some(err) = params.error {
        let detail = match params.error_description {
            Some(desc) => format!("{err}: {desc}"),
            None => err,
        };
        warn!(error = detail, "identity provider denied the authorization request");
        flow.deliver(Err(Error::AuthorizationDenied(detail.clone()))).await;
        return (
            StatusCode::BAD_REQUEST,
            format!("Login failed: {detail}. You may close this window."),
        )
            .into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
    };

    let delivered = flow
        .deliver(Ok(AuthorizationCode {
            code,
            verifier: flow_cookie.verifier,
        }))
        .await;
    if !delivered {
        return (StatusCode::GONE, "Login already completed.").into_response();
    }

    info!("authorization code received");
    (
        StatusCode::OK,
        "Login successful. You may close this window and return to the terminal.",
    )
        .into_response()
}

/// Run the interactive login and exchange the code for tokens.
///
/// Fails fast with [`Error::CallbackPortInUse`] when the port is taken and
/// with [`Error::LoginTimedOut`] when no callback arrives in time.
pub async fn run(
    http: &reqwest::Client,
    client_id: &str,
    authorization_endpoint: &str,
    token_endpoint: &str,
    options: &LoginOptions,
) -> Result<Token> {
    let listener = match TcpListener::bind(("127.0.0.1", options.port)).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            return Err(Error::CallbackPortInUse(options.port));
        }
        Err(e) => {
            return Err(Error::Callback(format!(
                "binding callback listener on port {}: {e}",
                options.port
            )));
        }
    };

    let redirect_uri = format!("http://localhost:{}{CALLBACK_PATH}", options.port);
    let login_url = format!("http://localhost:{}{LOGIN_PATH}", options.port);
    let (flow, code_rx) = LoginFlow::new(client_id, authorization_endpoint, &redirect_uri);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, callback_router(flow))
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    info!(url = login_url, port = options.port, "waiting for browser login");
    if options.open_browser {
        if let Err(e) = open::that_detached(&login_url) {
            warn!(error = %e, url = login_url, "could not open a browser; open the URL manually");
        }
    }

    let outcome = tokio::time::timeout(options.timeout, code_rx).await;

    // Tear the listener down before looking at the outcome.
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(LISTENER_DRAIN_TIMEOUT, &mut server).await {
        Ok(Ok(Ok(()))) => debug!("callback listener stopped"),
        Ok(Ok(Err(e))) => warn!(error = %e, "callback listener error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "callback listener task failed"),
        Err(_) => {
            warn!("callback listener did not drain in time, aborting");
            server.abort();
        }
    }

    let code = match outcome {
        Err(_) => return Err(Error::LoginTimedOut(options.timeout.as_secs())),
        Ok(Err(_)) => return Err(Error::Callback("callback listener closed".into())),
        Ok(Ok(result)) => result?,
    };

    token::exchange_code(
        http,
        token_endpoint,
        client_id,
        &code.code,
        &code.verifier,
        &redirect_uri,
    )
    .await
}
