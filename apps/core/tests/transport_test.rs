use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handoff_core::contract::{
    ApplySelectionRequest, CoreRequest, CoreResponse, FindShortcutsRequest, InputRequest,
    UnbindRequest,
};
use handoff_core::dispatcher::UnavailableRuntime;
use handoff_core::launcher::{Choice, Chooser, Launcher};
use handoff_core::model::{CandidateRegistration, Owner};
use handoff_core::resolver::{Outcome, Selection};
use handoff_core::shell_opener::{LaunchError, ShellOpener};
use handoff_core::shortcut_file::FileShortcutReader;
use handoff_core::shortcut_index::ShortcutIndex;
use handoff_core::store::Store;
use handoff_core::transport::{handle_json, handle_request, ErrorCode, TransportResponse};

struct NullShell;

impl ShellOpener for NullShell {
    fn open_uri(&self, _uri: &str) -> Result<(), LaunchError> {
        Ok(())
    }

    fn open_path(&self, _path: &str) -> Result<(), LaunchError> {
        Ok(())
    }

    fn open_in_file_manager(&self, path: &str) -> Result<(), LaunchError> {
        Err(LaunchError::MissingPath(path.into()))
    }
}

struct NeverChooses;

#[async_trait]
impl Chooser for NeverChooses {
    async fn choose(&self, _selection: &Selection) -> Option<Choice> {
        None
    }
}

fn launcher() -> Launcher {
    let shortcuts =
        ShortcutIndex::new(Vec::new(), Duration::from_secs(300), FileShortcutReader, None).unwrap();
    Launcher::with_shortcut_index(
        Store::open_memory().unwrap(),
        Arc::new(UnavailableRuntime),
        Arc::new(NullShell),
        Arc::new(NeverChooses),
        Arc::new(shortcuts),
    )
}

async fn error_code(launcher: &Launcher, request: CoreRequest) -> ErrorCode {
    let raw = handle_json(launcher, &serde_json::to_string(&request).unwrap()).await;
    match serde_json::from_str::<TransportResponse>(&raw).unwrap() {
        TransportResponse::Err { error } => error.code,
        other => panic!("expected error response, got {other:?}"),
    }
}

#[tokio::test]
async fn resolve_returns_ok_envelope() {
    let launcher = launcher();

    let response = handle_request(
        &launcher,
        CoreRequest::Resolve(InputRequest {
            input: "text".into(),
        }),
    )
    .await;

    match response {
        TransportResponse::Ok {
            response: CoreResponse::Resolve(payload),
        } => {
            assert!(matches!(payload.outcome, Outcome::Fallback(_)));
            let encoded = serde_json::to_string(&TransportResponse::Ok {
                response: CoreResponse::Resolve(payload),
            })
            .unwrap();
            assert!(encoded.contains("\"status\":\"ok\""));
            assert!(encoded.contains("\"outcome\":\"fallback\""));
        }
        other => panic!("expected ok resolve response, got {other:?}"),
    }
}

#[tokio::test]
async fn json_handler_returns_invalid_json_error_code() {
    let launcher = launcher();

    let raw = handle_json(&launcher, "{not-json").await;
    let parsed: TransportResponse = serde_json::from_str(&raw).unwrap();

    match parsed {
        TransportResponse::Err { error } => assert_eq!(error.code, ErrorCode::InvalidJson),
        _ => panic!("expected invalid json error"),
    }
}

#[tokio::test]
async fn blank_input_is_an_invalid_request() {
    let launcher = launcher();
    let request = CoreRequest::Open(InputRequest { input: "   ".into() });

    assert_eq!(error_code(&launcher, request).await, ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn failing_runtime_and_failing_fallback_map_to_dispatch_failed() {
    let launcher = launcher();
    launcher
        .register_candidate(CandidateRegistration::new(".qqq", Owner::plugin("p"), "p %0"))
        .await
        .unwrap();
    let request = CoreRequest::Open(InputRequest {
        input: "/no/such/file.qqq".into(),
    });

    assert_eq!(error_code(&launcher, request).await, ErrorCode::DispatchFailed);
}

#[tokio::test]
async fn failing_runtime_still_reaches_the_shell() {
    let launcher = launcher();
    launcher
        .register_candidate(CandidateRegistration::new("seq:", Owner::plugin("p"), "p %0"))
        .await
        .unwrap();
    let request = CoreRequest::Open(InputRequest {
        input: "seq:x".into(),
    });

    let raw = handle_json(&launcher, &serde_json::to_string(&request).unwrap()).await;
    assert!(matches!(
        serde_json::from_str::<TransportResponse>(&raw).unwrap(),
        TransportResponse::Ok { .. }
    ));
}

#[tokio::test]
async fn declined_chooser_maps_to_selection_cancelled() {
    let launcher = launcher();
    for owner in ["a", "b"] {
        launcher
            .register_candidate(CandidateRegistration::new("seq:", Owner::plugin(owner), "%0"))
            .await
            .unwrap();
    }
    let request = CoreRequest::Open(InputRequest {
        input: "seq:x".into(),
    });

    assert_eq!(error_code(&launcher, request).await, ErrorCode::SelectionCancelled);
}

#[tokio::test]
async fn failed_file_handoff_maps_to_shell_handoff_failed() {
    let launcher = launcher();
    let request = CoreRequest::Open(InputRequest {
        input: "/no/such/file.qqq".into(),
    });

    assert_eq!(error_code(&launcher, request).await, ErrorCode::ShellHandoffFailed);
}

#[tokio::test]
async fn apply_selection_validates_target() {
    let launcher = launcher();

    let both = CoreRequest::ApplySelection(ApplySelectionRequest {
        input: "seq:x".into(),
        candidate_id: Some("c".into()),
        system: true,
        routing_key: None,
        remember: false,
    });
    assert_eq!(error_code(&launcher, both).await, ErrorCode::InvalidRequest);

    let unknown = CoreRequest::ApplySelection(ApplySelectionRequest {
        input: "seq:x".into(),
        candidate_id: Some("missing".into()),
        system: false,
        routing_key: None,
        remember: false,
    });
    assert_eq!(error_code(&launcher, unknown).await, ErrorCode::CandidateNotFound);
}

#[tokio::test]
async fn remembered_system_choice_shows_up_in_bindings() {
    let launcher = launcher();
    let apply = CoreRequest::ApplySelection(ApplySelectionRequest {
        input: "seq:x".into(),
        candidate_id: None,
        system: true,
        routing_key: None,
        remember: true,
    });
    assert!(matches!(
        handle_request(&launcher, apply).await,
        TransportResponse::Ok { .. }
    ));

    match handle_request(&launcher, CoreRequest::ListBindings).await {
        TransportResponse::Ok {
            response: CoreResponse::ListBindings(payload),
        } => {
            assert_eq!(payload.bindings.len(), 1);
            assert_eq!(payload.bindings[0].routing_key, "seq:");
            assert!(payload.bindings[0].owner.is_system());
        }
        other => panic!("expected bindings, got {other:?}"),
    }

    let unbind = CoreRequest::Unbind(UnbindRequest {
        routing_key: "SEQ:".into(),
    });
    assert!(matches!(
        handle_request(&launcher, unbind).await,
        TransportResponse::Ok {
            response: CoreResponse::Unbind(_)
        }
    ));
    assert!(launcher.list_bindings().await.unwrap().is_empty());
}

#[tokio::test]
async fn find_shortcuts_on_empty_index_returns_no_results() {
    let launcher = launcher();
    let request = CoreRequest::FindShortcuts(FindShortcutsRequest {
        query: "code".into(),
        limit: None,
    });

    match handle_request(&launcher, request).await {
        TransportResponse::Ok {
            response: CoreResponse::FindShortcuts(payload),
        } => assert!(payload.shortcuts.is_empty()),
        other => panic!("expected shortcuts, got {other:?}"),
    }
}
