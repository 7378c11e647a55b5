use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{validate, Config};
use crate::dispatcher::{DispatchError, Dispatcher, Handled, PluginRuntime};
use crate::model::{CandidateRegistration, HandlerBinding, HandlerCandidate};
use crate::request::Request;
use crate::resolver::{Outcome, Resolver, Selection};
use crate::shell_opener::ShellOpener;
use crate::shortcut_file::ShortcutEntry;
use crate::shortcut_index::{IndexError, ShortcutIndex};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("shortcut index error: {0}")]
    Index(#[from] IndexError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A chooser answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub candidate: HandlerCandidate,
    pub remember: bool,
}

/// Asks the user to pick between handlers. `None` means the user cancelled.
#[async_trait]
pub trait Chooser: Send + Sync {
    async fn choose(&self, selection: &Selection) -> Option<Choice>;
}

/// Which candidate a presentation layer picked after showing its own chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionTarget {
    Candidate(String),
    System { routing_key: Option<String> },
}

/// Parser, resolver and dispatcher wired together behind one handle.
pub struct Launcher {
    store: Store,
    resolver: Resolver,
    dispatcher: Dispatcher,
    chooser: Arc<dyn Chooser>,
}

impl Launcher {
    pub fn new(
        config: &Config,
        store: Store,
        runtime: Arc<dyn PluginRuntime>,
        shell: Arc<dyn ShellOpener>,
        chooser: Arc<dyn Chooser>,
    ) -> Result<Self, ServiceError> {
        validate(config).map_err(ServiceError::Config)?;
        let shortcuts = Arc::new(ShortcutIndex::from_config(config)?);
        Ok(Self::with_shortcut_index(store, runtime, shell, chooser, shortcuts))
    }

    pub fn with_shortcut_index(
        store: Store,
        runtime: Arc<dyn PluginRuntime>,
        shell: Arc<dyn ShellOpener>,
        chooser: Arc<dyn Chooser>,
        shortcuts: Arc<ShortcutIndex>,
    ) -> Self {
        Self {
            resolver: Resolver::new(&store),
            dispatcher: Dispatcher::new(runtime, shell, shortcuts),
            store,
            chooser,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn shortcuts(&self) -> &Arc<ShortcutIndex> {
        self.dispatcher.shortcuts()
    }

    pub async fn resolve(&self, raw: &str) -> Outcome {
        self.resolver.resolve(&Request::parse(raw)).await
    }

    /// Parses, resolves and services `raw`, consulting the chooser when the
    /// resolver cannot decide on its own.
    pub async fn open(&self, raw: &str) -> Result<Handled, DispatchError> {
        let request = Request::parse(raw);
        debug!(input = raw, kind = ?request.kind, routing_key = %request.routing_key, "parsed request");

        let outcome = match self.resolver.resolve(&request).await {
            Outcome::NeedsSelection(selection) => {
                let Some(choice) = self.chooser.choose(&selection).await else {
                    info!(routing_key = %selection.routing_key, "handler selection cancelled");
                    return Err(DispatchError::SelectionCancelled);
                };
                self.resolver
                    .apply_selection(&choice.candidate, &selection.request, choice.remember)
                    .await
            }
            decided => decided,
        };

        self.execute(outcome, &request).await
    }

    /// Applies a choice made outside [`Chooser`] and services the request with it.
    pub async fn open_with(
        &self,
        raw: &str,
        target: SelectionTarget,
        remember: bool,
    ) -> Result<Handled, ServiceError> {
        let request = Request::parse(raw);
        let candidate = match target {
            SelectionTarget::Candidate(candidate_id) => self
                .resolver
                .candidates()
                .get(&candidate_id)
                .await?
                .ok_or(ServiceError::CandidateNotFound(candidate_id))
                .and_then(|candidate| {
                    if request.routes_through(&candidate.routing_key) {
                        Ok(candidate)
                    } else {
                        Err(ServiceError::InvalidRequest(format!(
                            "candidate '{}' handles '{}', not '{}'",
                            candidate.candidate_id, candidate.routing_key, request.routing_key
                        )))
                    }
                })?,
            SelectionTarget::System { routing_key } => {
                let key = routing_key.unwrap_or_else(|| request.routing_key.clone());
                if key.trim().is_empty() {
                    return Err(ServiceError::InvalidRequest(
                        "system choice needs a routing key".to_string(),
                    ));
                }
                HandlerCandidate::system(&key)
            }
        };

        let outcome = self
            .resolver
            .apply_selection(&candidate, &request, remember)
            .await;
        Ok(self.execute(outcome, &request).await?)
    }

    pub async fn unbind(&self, routing_key: &str) -> Result<(), ServiceError> {
        if routing_key.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("routing key is empty".to_string()));
        }
        self.resolver.bindings().remove(routing_key).await?;
        Ok(())
    }

    pub async fn list_bindings(&self) -> Result<Vec<HandlerBinding>, ServiceError> {
        Ok(self.resolver.bindings().list().await?)
    }

    pub async fn register_candidate(
        &self,
        registration: CandidateRegistration,
    ) -> Result<HandlerCandidate, ServiceError> {
        if registration.routing_key.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("routing key is empty".to_string()));
        }
        Ok(self.resolver.candidates().register(registration).await?)
    }

    pub async fn find_shortcuts(&self, query: &str, limit: usize) -> Vec<ShortcutEntry> {
        let shortcuts = self.dispatcher.shortcuts();
        if let Err(error) = shortcuts.refresh().await {
            warn!(%error, "shortcut refresh failed; using last snapshot");
        }
        shortcuts.find_all(query, limit)
    }

    pub fn close(&self) -> Result<(), ServiceError> {
        Ok(self.store.close()?)
    }

    async fn execute(&self, outcome: Outcome, request: &Request) -> Result<Handled, DispatchError> {
        match outcome {
            Outcome::Dispatch(invocation) => self.dispatcher.service(&invocation, request).await,
            Outcome::Fallback(request) => self.dispatcher.fallback(&request).await,
            Outcome::NeedsSelection(selection) => {
                warn!(routing_key = %selection.routing_key, "selection left unresolved");
                Err(DispatchError::SelectionCancelled)
            }
        }
    }
}
