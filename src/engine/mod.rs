//! Execution engine
//!
//! Drives a manifest end to end: entry-point discovery, graph traversal
//! over dependency edges, pagination, the OAuth2 sub-flow, dataset
//! aggregation, and the run summary.
//!
//! Traversal is strictly sequential. Entry requests run in manifest order,
//! edges resolve in manifest order, and fan-out contexts run in index
//! order, so observed side effects on shared auth state are deterministic.

mod types;

pub use types::{RunStats, RunSummary};

use crate::context::{system, RequestContext};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::manifest::{DependencyDef, LoadType, Manifest};
use crate::oauth::OAuth2Coordinator;
use crate::output::write_datasets;
use crate::resolver::Resolver;
use crate::store::{AuthState, TokenStore};
use crate::template;
use crate::transform::Pipeline;
use crate::types::{Response, ResponseHistory};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The OAuth2 alias request name; edges may reference it in `from`
const ENV_REQUEST: &str = "env";

/// Executes one manifest run
pub struct Executor<'a> {
    manifest: &'a Manifest,
    credentials: HashMap<String, String>,
    store: TokenStore,
    client: HttpClient,
    coordinator: OAuth2Coordinator,
    force_reauth: bool,
    history: ResponseHistory,
    results: HashMap<String, Vec<Value>>,
    visited: HashSet<String>,
    stats: RunStats,
}

impl<'a> Executor<'a> {
    /// Create an executor over the run's collaborators
    pub fn new(
        manifest: &'a Manifest,
        credentials: HashMap<String, String>,
        store: TokenStore,
        client: HttpClient,
        coordinator: OAuth2Coordinator,
    ) -> Self {
        Self {
            manifest,
            credentials,
            store,
            client,
            coordinator,
            force_reauth: false,
            history: ResponseHistory::new(),
            results: HashMap::new(),
            visited: HashSet::new(),
            stats: RunStats::new(),
        }
    }

    /// Clear persisted auth state before executing
    #[must_use]
    pub fn with_force_reauth(mut self, force: bool) -> Self {
        self.force_reauth = force;
        self
    }

    /// Execute the run and write datasets into `output_dir`
    pub async fn run(&mut self, output_dir: impl Into<PathBuf>) -> Result<RunSummary> {
        let started = Instant::now();

        if self.force_reauth {
            self.store.clear().await?;
        }
        let mut auth_state = self.store.load().await?;

        if self.manifest.requires_oauth2() && auth_state.is_token_expired() {
            self.run_oauth2_subflow().await?;
            // The token-exchange leg persisted authy values; pick them up.
            auth_state = self.store.load().await?;
        }

        let excluded = self.oauth2_adjacent();
        let base = self.base_context(auth_state);

        let entries: Vec<String> = self
            .manifest
            .reqs
            .iter()
            .filter(|req| {
                let Some(url) = &req.url else { return false };
                if url.contains("{{") || req.name == ENV_REQUEST {
                    return false;
                }
                if let Some(headers) = &req.headers {
                    if headers.values().any(|v| v.contains("{{")) {
                        return false;
                    }
                }
                !excluded.contains(req.name.as_str())
            })
            .map(|req| req.name.clone())
            .collect();
        debug!("Entry requests: {entries:?}");

        for entry in entries {
            self.execute_node(entry, base.clone()).await?;
        }

        let datasets_written =
            write_datasets(output_dir.into(), &self.manifest.datasets, &self.results).await?;

        self.stats.unique_endpoints = self.visited.len();
        Ok(RunSummary {
            manifest_id: self.manifest.id.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            stats: self.stats.clone(),
            datasets_written,
        })
    }

    /// The initial context entry requests start from
    fn base_context(&self, auth_state: AuthState) -> RequestContext {
        let redirect = self.coordinator.redirect_uri();
        let mut system_variables = HashMap::new();
        system_variables.insert(system::PRECOG_ROOT_URI.to_string(), redirect.clone());
        system_variables.insert(system::PRECOG_REDIRECT_URI.to_string(), redirect.clone());
        system_variables.insert(system::REDIRECT_URI.to_string(), redirect);

        let mut ctx = RequestContext::with_credentials(self.credentials.clone(), system_variables);
        ctx.auth_state = auth_state;
        ctx
    }

    /// Requests handled by the OAuth2 sub-flow, excluded from traversal:
    /// the authorization request plus the direct targets of its edges.
    fn oauth2_adjacent(&self) -> HashSet<&str> {
        let mut excluded = HashSet::new();
        let Some(auth) = self
            .manifest
            .oauth2_request()
            .or_else(|| self.manifest.request(ENV_REQUEST))
        else {
            return excluded;
        };

        excluded.insert(auth.name.as_str());
        excluded.insert(ENV_REQUEST);
        for edge in self.edges_from(&auth.name) {
            for to in &edge.to {
                excluded.insert(to.as_str());
            }
        }
        excluded
    }

    /// Non-delta edges whose `from` contains the name (or its `env` alias
    /// when the name is the authorization request)
    fn edges_from(&self, name: &str) -> Vec<&'a DependencyDef> {
        let is_auth = self
            .manifest
            .oauth2_request()
            .is_some_and(|r| r.name == name);
        self.manifest
            .deps
            .iter()
            .filter(|edge| edge.loadtype != Some(LoadType::Delta))
            .filter(|edge| {
                edge.from
                    .iter()
                    .any(|f| f == name || (is_auth && f == ENV_REQUEST))
            })
            .collect()
    }

    /// Run the interactive authorization leg and its token-exchange edges
    async fn run_oauth2_subflow(&mut self) -> Result<()> {
        let auth = self
            .manifest
            .oauth2_request()
            .or_else(|| self.manifest.request(ENV_REQUEST))
            .ok_or_else(|| {
                Error::oauth2("manifest requires OAuth2 but declares no authorization request")
            })?;
        let auth_name = auth.name.clone();

        let authorize_url = auth
            .args
            .as_ref()
            .and_then(|args| args.get("authorizeUrl"))
            .ok_or_else(|| Error::oauth2("authorization request has no authorizeUrl argument"))?
            .clone();

        let mut ctx = self.base_context(self.store.load().await?);
        ctx.system_variables.insert(
            system::PRECOG_STATE.to_string(),
            OAuth2Coordinator::generate_state(),
        );

        info!("Starting OAuth2 authorization for {}", self.manifest.id);
        let response = self.coordinator.authorize(&authorize_url, &ctx).await?;

        if let Some(code) = response.body["query"]["code"].as_str() {
            ctx.system_variables
                .insert(system::OAUTH2_CODE.to_string(), code.to_string());
        }

        // Edges in the wild address the authorization response by either
        // spelling, so it is stored under both.
        self.history.push(ENV_REQUEST, response.clone());
        if auth_name != ENV_REQUEST {
            self.history.push(auth_name.clone(), response);
        }

        for edge in self.edges_from(&auth_name) {
            let children = Resolver::new(&self.store)
                .resolve(edge, &self.history, &ctx, false)
                .await?;
            let current = self.store.load().await?;

            for mut child in children {
                child.auth_state = current.clone();
                for to in &edge.to {
                    self.issue_request(to, &child).await?;

                    // Chained edges run for their authy side effects only;
                    // their targets stay un-executed.
                    for chained in self.edges_from(to) {
                        Resolver::new(&self.store)
                            .resolve(chained, &self.history, &child, false)
                            .await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Recursive traversal out of one request node
    fn execute_node(&mut self, name: String, ctx: RequestContext) -> BoxFuture<'_, Result<()>> {
        async move {
            let Some(response) = self.issue_request(&name, &ctx).await? else {
                return Ok(());
            };

            for edge in self.edges_from(&name) {
                let latest_only = edge.is_pagination();
                if latest_only && pagination_exhausted(&response) {
                    debug!("Pagination stopped for {name}");
                    continue;
                }

                let children = Resolver::new(&self.store)
                    .resolve(edge, &self.history, &ctx, latest_only)
                    .await?;

                // A nested authy write may have landed during resolution;
                // children observe the freshest auth state.
                let current = self.store.load().await?;

                for mut child in children {
                    child.auth_state = current.clone();
                    for to in &edge.to {
                        self.execute_node(to.clone(), child.clone()).await?;
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Steps 1-6 of per-request execution: resolve the URL, dedup on the
    /// url key, issue the call, and record the outcome.
    ///
    /// Returns `Ok(None)` when the node is skipped or failed non-fatally.
    async fn issue_request(&mut self, name: &str, ctx: &RequestContext) -> Result<Option<Response>> {
        let Some(request) = self.manifest.request(name) else {
            debug!("Request '{name}' is not declared, skipping");
            return Ok(None);
        };
        if request.function.is_some() {
            return Ok(None);
        }
        let Some(url_template) = &request.url else {
            debug!("Request '{name}' has no URL, skipping");
            return Ok(None);
        };

        // First pass binds extracted data; a second pass over the remainder
        // draws on the full context. Anything still unresolved skips the
        // node rather than issuing a malformed URL.
        let mut url = template::render_extracted(url_template, ctx);
        if template::has_templates(&url) {
            url = template::render_optional(&url, ctx);
            if template::has_templates(&url) {
                debug!("Request '{name}' still has unresolved variables, skipping");
                return Ok(None);
            }
        }

        let url_key = format!("{name}:{url}");
        if !self.visited.insert(url_key) {
            debug!("Already issued {name} at {url}, skipping");
            return Ok(None);
        }

        self.stats.total_requests += 1;
        let pipeline = Pipeline::for_request(self.manifest, request);
        let result = self.client.request(&url, request, &pipeline, ctx).await;

        match result {
            Ok(outcome) => {
                if outcome.needs_reauth {
                    warn!("{name} matched a reauth condition; expiring the access token");
                    let mut state = self.store.load().await?;
                    state.access_token = None;
                    state.expires_at = None;
                    self.store.save(&state).await?;
                }

                self.stats.successful_requests += 1;
                self.results
                    .entry(name.to_string())
                    .or_default()
                    .push(outcome.response.body.clone());
                self.history.push(name, outcome.response.clone());
                Ok(Some(outcome.response))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{name} failed: {e}");
                self.stats.record_error(name, &e.to_string());
                Ok(None)
            }
        }
    }
}

/// Pagination halts when `body.next` is null, absent, or empty
fn pagination_exhausted(response: &Response) -> bool {
    match response.body.get("next") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
