use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::request::{Request, RequestKind};
use crate::resolver::Invocation;
use crate::shell_opener::{LaunchError, ShellOpener};
use crate::shortcut_index::ShortcutIndex;

/// Failure reported by the plugin runtime for a single entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeFailure {
    pub message: String,
}

impl RuntimeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The host's plugin runtime. Both entry points receive the full argument
/// vector built from the command template.
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    async fn invoke_primary(&self, owner_id: &str, args: &[String]) -> Result<(), RuntimeFailure>;
    async fn invoke_secondary(&self, owner_id: &str, args: &[String]) -> Result<(), RuntimeFailure>;
}

/// Runtime for hosts that load no plugins; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRuntime;

#[async_trait]
impl PluginRuntime for UnavailableRuntime {
    async fn invoke_primary(&self, owner_id: &str, _args: &[String]) -> Result<(), RuntimeFailure> {
        Err(RuntimeFailure::new(format!("plugin runtime unavailable for '{owner_id}'")))
    }

    async fn invoke_secondary(&self, owner_id: &str, _args: &[String]) -> Result<(), RuntimeFailure> {
        Err(RuntimeFailure::new(format!("plugin runtime unavailable for '{owner_id}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    Primary,
    Secondary,
}

/// What actually serviced a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Handled {
    Plugin { owner: String, entry: EntryPoint },
    Shortcut { name: String, path: PathBuf },
    Shell { target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("handler '{owner}' failed: {message}")]
    DispatchFailed { owner: String, message: String },
    #[error("shell handoff failed: {0}")]
    ShellHandoffFailed(String),
    #[error("selection cancelled")]
    SelectionCancelled,
}

impl From<LaunchError> for DispatchError {
    fn from(value: LaunchError) -> Self {
        Self::ShellHandoffFailed(value.to_string())
    }
}

pub struct Dispatcher {
    runtime: Arc<dyn PluginRuntime>,
    shell: Arc<dyn ShellOpener>,
    shortcuts: Arc<ShortcutIndex>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("shortcuts", &self.shortcuts)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        runtime: Arc<dyn PluginRuntime>,
        shell: Arc<dyn ShellOpener>,
        shortcuts: Arc<ShortcutIndex>,
    ) -> Self {
        Self {
            runtime,
            shell,
            shortcuts,
        }
    }

    pub fn shortcuts(&self) -> &Arc<ShortcutIndex> {
        &self.shortcuts
    }

    /// Runs the primary entry point, retrying once through the secondary one.
    pub async fn dispatch(&self, invocation: &Invocation) -> Result<Handled, DispatchError> {
        let owner = invocation.owner_id.as_str();
        let primary = match self.runtime.invoke_primary(owner, &invocation.args).await {
            Ok(()) => {
                info!(owner, candidate_id = %invocation.candidate_id, "handler invoked");
                return Ok(Handled::Plugin {
                    owner: owner.to_string(),
                    entry: EntryPoint::Primary,
                });
            }
            Err(failure) => failure,
        };

        warn!(owner, error = %primary, "primary entry point failed; retrying via secondary");
        match self.runtime.invoke_secondary(owner, &invocation.args).await {
            Ok(()) => {
                info!(owner, "handler invoked through secondary entry point");
                Ok(Handled::Plugin {
                    owner: owner.to_string(),
                    entry: EntryPoint::Secondary,
                })
            }
            Err(failure) => {
                warn!(owner, error = %failure, "secondary entry point failed");
                Err(DispatchError::DispatchFailed {
                    owner: owner.to_string(),
                    message: failure.message,
                })
            }
        }
    }

    /// Dispatches `invocation`, continuing down the fallback chain when both
    /// entry points fail. The plugin failure is reported only if the fallback
    /// fails as well.
    pub async fn service(
        &self,
        invocation: &Invocation,
        request: &Request,
    ) -> Result<Handled, DispatchError> {
        let failure = match self.dispatch(invocation).await {
            Ok(handled) => return Ok(handled),
            Err(failure) => failure,
        };

        info!(owner = %invocation.owner_id, input = %request.raw_input, "handler failed; falling back");
        match self.fallback(request).await {
            Ok(handled) => Ok(handled),
            Err(error) => {
                warn!(owner = %invocation.owner_id, %error, "fallback after handler failure failed");
                Err(failure)
            }
        }
    }

    /// Shortcut match on the raw input first, then the OS shell.
    pub async fn fallback(&self, request: &Request) -> Result<Handled, DispatchError> {
        if let Err(error) = self.shortcuts.refresh().await {
            warn!(%error, "shortcut refresh failed; using last snapshot");
        }

        if let Some(hit) = self.shortcuts.find_first(&request.raw_input) {
            let path = hit.shortcut_path.to_string_lossy();
            info!(name = %hit.name, path = %path, "opening matching shortcut");
            self.shell.open_path(&path)?;
            return Ok(Handled::Shortcut {
                name: hit.name,
                path: hit.shortcut_path,
            });
        }

        let result = match (&request.kind, &request.file_path) {
            (RequestKind::FileType, Some(path)) => {
                info!(path, "handing file to the file manager");
                self.shell
                    .open_in_file_manager(path)
                    .map(|()| path.clone())
            }
            _ => {
                info!(input = %request.raw_input, "handing input to the shell");
                self.shell
                    .open_uri(&request.raw_input)
                    .map(|()| request.raw_input.clone())
            }
        };

        match result {
            Ok(target) => Ok(Handled::Shell { target }),
            Err(error) => {
                warn!(input = %request.raw_input, %error, "shell handoff failed");
                Err(error.into())
            }
        }
    }
}
