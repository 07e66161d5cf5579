//! Interactive authorization-code flow
//!
//! Serves a single `/callback` request on a local listener, validates the
//! CSRF state, and hands back a synthetic response shaped
//! `{status: 200, body: {query: {code, state}}}` for `select` paths to
//! bind against.

use crate::context::{system, RequestContext};
use crate::error::{Error, Result};
use crate::template;
use crate::types::Response;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use rand::RngCore;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

/// Default listener port
pub const DEFAULT_REDIRECT_PORT: u16 = 3000;
/// How long to wait for the browser callback
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Grace period for the in-flight callback response before the listener is
/// torn down forcibly
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Capability used to open the user's browser; tests inject a no-op
pub type BrowserOpener = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Drives the interactive authorization-code leg
pub struct OAuth2Coordinator {
    port: u16,
    redirect_override: Option<String>,
    browser: BrowserOpener,
    timeout: Duration,
}

impl OAuth2Coordinator {
    /// Create a coordinator listening on the given port
    pub fn new(port: u16) -> Self {
        Self {
            port,
            redirect_override: None,
            browser: Arc::new(|url| {
                open::that(url).map_err(|e| Error::oauth2(format!("Failed to open browser: {e}")))
            }),
            timeout: CALLBACK_TIMEOUT,
        }
    }

    /// Override the derived redirect URI
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_override = Some(uri.into());
        self
    }

    /// Replace the browser capability
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserOpener) -> Self {
        self.browser = browser;
        self
    }

    /// Shorten the callback deadline (tests)
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The redirect URI handed to the authorization server
    pub fn redirect_uri(&self) -> String {
        self.redirect_override
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/callback", self.port))
    }

    /// Generate a CSRF state: 32 random bytes, hex-encoded
    pub fn generate_state() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Run the authorization leg for an authorize-URL template.
    ///
    /// The expected CSRF state is read from `precog_state` when the caller
    /// generated one (so the interpolated URL can reference it); otherwise a
    /// fresh state is generated here.
    pub async fn authorize(
        &self,
        authorize_url_template: &str,
        ctx: &RequestContext,
    ) -> Result<Response> {
        let expected_state = ctx
            .system_variables
            .get(system::PRECOG_STATE)
            .cloned()
            .unwrap_or_else(Self::generate_state);

        let rendered = template::render(authorize_url_template, ctx)?;
        let mut authorize_url = Url::parse(&rendered)?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| Error::oauth2(format!("Failed to bind callback listener: {e}")))?;
        let bound_port = listener
            .local_addr()
            .map_err(|e| Error::oauth2(format!("Failed to read listener address: {e}")))?
            .port();
        let redirect_uri = self
            .redirect_override
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{bound_port}/callback"));

        // Inject redirect_uri and state only when the template left them out.
        ensure_query_param(&mut authorize_url, "redirect_uri", &redirect_uri);
        ensure_query_param(&mut authorize_url, "state", &expected_state);

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let callback_state = Arc::new(CallbackState {
            expected_state: expected_state.clone(),
            result: Mutex::new(Some(result_tx)),
            shutdown: Mutex::new(Some(shutdown_tx)),
        });

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(Arc::clone(&callback_state));

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Waiting for OAuth2 callback at {redirect_uri}");
        println!("Open this URL to authorize:\n{authorize_url}");
        if let Err(e) = (self.browser)(authorize_url.as_str()) {
            warn!("{e}");
        }

        let outcome = tokio::time::timeout(self.timeout, result_rx).await;

        // The handler fires shutdown after responding; on timeout we fire it
        // ourselves, then force the listener down so the port frees.
        if let Some(tx) = callback_state.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await;
        server.abort();

        match outcome {
            Ok(Ok(CallbackOutcome::Success { code, state })) => Ok(Response::synthetic(
                200,
                json!({"query": {"code": code, "state": state}}),
            )),
            Ok(Ok(CallbackOutcome::Failed(message))) => Err(Error::oauth2(message)),
            Ok(Err(_)) => Err(Error::oauth2("callback listener closed unexpectedly")),
            Err(_) => Err(Error::oauth2("timed out waiting for authorization callback")),
        }
    }
}

/// What the callback handler observed
enum CallbackOutcome {
    Success { code: String, state: String },
    Failed(String),
}

struct CallbackState {
    expected_state: String,
    result: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl CallbackState {
    fn finish(&self, outcome: CallbackOutcome) {
        if let Some(tx) = self.result.lock().unwrap().take() {
            let _ = tx.send(outcome);
        }
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("no description");
        state.finish(CallbackOutcome::Failed(format!(
            "authorization failed: {error} ({description})"
        )));
        return (
            StatusCode::OK,
            Html(error_page(&format!("Authorization failed: {error}"))),
        );
    }

    let Some(code) = params.get("code") else {
        state.finish(CallbackOutcome::Failed(
            "callback carried no authorization code".into(),
        ));
        return (
            StatusCode::BAD_REQUEST,
            Html(error_page("Missing authorization code")),
        );
    };

    let returned_state = params.get("state").map(String::as_str).unwrap_or_default();
    if returned_state != state.expected_state {
        state.finish(CallbackOutcome::Failed(
            "state mismatch, possible CSRF".into(),
        ));
        return (
            StatusCode::BAD_REQUEST,
            Html(error_page("State mismatch, possible CSRF")),
        );
    }

    state.finish(CallbackOutcome::Success {
        code: code.clone(),
        state: returned_state.to_string(),
    });
    (StatusCode::OK, Html(success_page()))
}

fn ensure_query_param(url: &mut Url, name: &str, value: &str) {
    let present = url.query_pairs().any(|(k, _)| k == name);
    if !present {
        url.query_pairs_mut().append_pair(name, value);
    }
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
  <head><title>Authorization complete</title></head>
  <body>
    <h2>Authorization complete</h2>
    <p>You can return to the terminal. This window closes automatically.</p>
    <script>setTimeout(function () { window.close(); }, 2000);</script>
  </body>
</html>"#
        .to_string()
}

fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Authorization error</title></head>
  <body>
    <h2>Authorization error</h2>
    <p>{message}</p>
  </body>
</html>"#
    )
}
