use serde::{Deserialize, Serialize};

use crate::contract::{
    ApplySelectionRequest, BindingsResponse, CoreRequest, CoreResponse, HandledResponse,
    ResolveResponse, ShortcutDto, ShortcutsResponse, UnbindResponse,
};
use crate::dispatcher::DispatchError;
use crate::launcher::{Launcher, SelectionTarget, ServiceError};

const DEFAULT_SHORTCUT_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidRequest,
    CandidateNotFound,
    DispatchFailed,
    ShellHandoffFailed,
    SelectionCancelled,
    Store,
    Config,
    ShortcutIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: CoreResponse },
    Err { error: ErrorResponse },
}

pub async fn handle_request(launcher: &Launcher, request: CoreRequest) -> TransportResponse {
    match run(launcher, request).await {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => TransportResponse::Err {
            error: map_service_error(error),
        },
    }
}

pub async fn handle_json(launcher: &Launcher, payload: &str) -> String {
    let response = match serde_json::from_str::<CoreRequest>(payload) {
        Ok(request) => handle_request(launcher, request).await,
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };

    serde_json::to_string(&response).expect("transport response should serialize")
}

async fn run(launcher: &Launcher, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
    match request {
        CoreRequest::Resolve(request) => {
            let input = required(&request.input, "input")?;
            Ok(CoreResponse::Resolve(ResolveResponse {
                outcome: launcher.resolve(input).await,
            }))
        }
        CoreRequest::Open(request) => {
            let input = required(&request.input, "input")?;
            let handled = launcher.open(input).await?;
            Ok(CoreResponse::Open(HandledResponse { handled }))
        }
        CoreRequest::ApplySelection(request) => {
            let input = required(&request.input, "input")?.to_string();
            let target = selection_target(&request)?;
            let handled = launcher.open_with(&input, target, request.remember).await?;
            Ok(CoreResponse::ApplySelection(HandledResponse { handled }))
        }
        CoreRequest::Unbind(request) => {
            launcher.unbind(&request.routing_key).await?;
            Ok(CoreResponse::Unbind(UnbindResponse {
                routing_key: request.routing_key.trim().to_lowercase(),
            }))
        }
        CoreRequest::ListBindings => Ok(CoreResponse::ListBindings(BindingsResponse {
            bindings: launcher.list_bindings().await?,
        })),
        CoreRequest::FindShortcuts(request) => {
            let limit = request.limit.unwrap_or(DEFAULT_SHORTCUT_LIMIT);
            let shortcuts = launcher
                .find_shortcuts(&request.query, limit)
                .await
                .into_iter()
                .map(ShortcutDto::from)
                .collect();
            Ok(CoreResponse::FindShortcuts(ShortcutsResponse { shortcuts }))
        }
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidRequest(format!("{field} is empty")));
    }
    Ok(trimmed)
}

fn selection_target(request: &ApplySelectionRequest) -> Result<SelectionTarget, ServiceError> {
    match (&request.candidate_id, request.system) {
        (None, true) => Ok(SelectionTarget::System {
            routing_key: request.routing_key.clone(),
        }),
        (Some(candidate_id), false) if !candidate_id.trim().is_empty() => {
            Ok(SelectionTarget::Candidate(candidate_id.trim().to_string()))
        }
        _ => Err(ServiceError::InvalidRequest(
            "exactly one of candidate_id or system is required".to_string(),
        )),
    }
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    let message = error.to_string();
    let code = match error {
        ServiceError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        ServiceError::CandidateNotFound(_) => ErrorCode::CandidateNotFound,
        ServiceError::Store(_) => ErrorCode::Store,
        ServiceError::Config(_) => ErrorCode::Config,
        ServiceError::Index(_) => ErrorCode::ShortcutIndex,
        ServiceError::Dispatch(DispatchError::DispatchFailed { .. }) => ErrorCode::DispatchFailed,
        ServiceError::Dispatch(DispatchError::ShellHandoffFailed(_)) => {
            ErrorCode::ShellHandoffFailed
        }
        ServiceError::Dispatch(DispatchError::SelectionCancelled) => ErrorCode::SelectionCancelled,
    };
    ErrorResponse { code, message }
}
