use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use handoff_core::config::ShortcutRoot;
use handoff_core::dispatcher::{
    DispatchError, Dispatcher, EntryPoint, Handled, PluginRuntime, RuntimeFailure,
};
use handoff_core::request::Request;
use handoff_core::resolver::Invocation;
use handoff_core::shell_opener::{LaunchError, ShellOpener};
use handoff_core::shortcut_file::FileShortcutReader;
use handoff_core::shortcut_index::ShortcutIndex;

#[derive(Default)]
struct FakeRuntime {
    primary_fails: bool,
    secondary_fails: bool,
    calls: Mutex<Vec<(EntryPoint, String, Vec<String>)>>,
}

#[async_trait]
impl PluginRuntime for FakeRuntime {
    async fn invoke_primary(&self, owner_id: &str, args: &[String]) -> Result<(), RuntimeFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((EntryPoint::Primary, owner_id.to_string(), args.to_vec()));
        if self.primary_fails {
            Err(RuntimeFailure::new("primary broke"))
        } else {
            Ok(())
        }
    }

    async fn invoke_secondary(&self, owner_id: &str, args: &[String]) -> Result<(), RuntimeFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((EntryPoint::Secondary, owner_id.to_string(), args.to_vec()));
        if self.secondary_fails {
            Err(RuntimeFailure::new("secondary broke"))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct RecordingShell {
    fail: bool,
    opened: Mutex<Vec<String>>,
}

impl RecordingShell {
    fn record(&self, how: &str, target: &str) -> Result<(), LaunchError> {
        self.opened.lock().unwrap().push(format!("{how}:{target}"));
        if self.fail {
            Err(LaunchError::LaunchFailed {
                message: "no association".to_string(),
                code: Some(1155),
            })
        } else {
            Ok(())
        }
    }
}

impl ShellOpener for RecordingShell {
    fn open_uri(&self, uri: &str) -> Result<(), LaunchError> {
        self.record("uri", uri)
    }

    fn open_path(&self, path: &str) -> Result<(), LaunchError> {
        self.record("path", path)
    }

    fn open_in_file_manager(&self, path: &str) -> Result<(), LaunchError> {
        self.record("manager", path)
    }
}

fn empty_index() -> Arc<ShortcutIndex> {
    Arc::new(
        ShortcutIndex::new(Vec::new(), Duration::from_secs(300), FileShortcutReader, None).unwrap(),
    )
}

fn index_over(dir: &Path) -> Arc<ShortcutIndex> {
    Arc::new(
        ShortcutIndex::new(
            vec![ShortcutRoot::recursive(dir)],
            Duration::from_secs(300),
            FileShortcutReader,
            None,
        )
        .unwrap(),
    )
}

fn invocation() -> Invocation {
    Invocation::from_template("viewer", "cand-1", "view %0", &Request::parse("seq:clip"))
}

#[tokio::test]
async fn primary_success_does_not_retry() {
    let runtime = Arc::new(FakeRuntime::default());
    let dispatcher = Dispatcher::new(runtime.clone(), Arc::new(RecordingShell::default()), empty_index());

    let handled = dispatcher.dispatch(&invocation()).await.unwrap();

    assert_eq!(
        handled,
        Handled::Plugin {
            owner: "viewer".to_string(),
            entry: EntryPoint::Primary
        }
    );
    let calls = runtime.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].2, vec!["view clip".to_string(), "clip".to_string()]);
}

#[tokio::test]
async fn primary_failure_retries_secondary_with_same_args() {
    let runtime = Arc::new(FakeRuntime {
        primary_fails: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(runtime.clone(), Arc::new(RecordingShell::default()), empty_index());

    let handled = dispatcher.dispatch(&invocation()).await.unwrap();

    assert!(matches!(
        handled,
        Handled::Plugin {
            entry: EntryPoint::Secondary,
            ..
        }
    ));
    let calls = runtime.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].2, calls[1].2);
}

#[tokio::test]
async fn double_failure_reports_second_error() {
    let runtime = Arc::new(FakeRuntime {
        primary_fails: true,
        secondary_fails: true,
        ..Default::default()
    });
    let shell = Arc::new(RecordingShell::default());
    let dispatcher = Dispatcher::new(runtime, shell.clone(), empty_index());

    let error = dispatcher.dispatch(&invocation()).await.unwrap_err();

    assert_eq!(
        error,
        DispatchError::DispatchFailed {
            owner: "viewer".to_string(),
            message: "secondary broke".to_string()
        }
    );
    assert!(shell.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn protocol_fallback_hands_raw_input_to_shell() {
    let shell = Arc::new(RecordingShell::default());
    let dispatcher = Dispatcher::new(Arc::new(FakeRuntime::default()), shell.clone(), empty_index());

    let handled = dispatcher
        .fallback(&Request::parse("mailto:someone@example.com"))
        .await
        .unwrap();

    assert_eq!(
        handled,
        Handled::Shell {
            target: "mailto:someone@example.com".to_string()
        }
    );
    assert_eq!(
        *shell.opened.lock().unwrap(),
        vec!["uri:mailto:someone@example.com".to_string()]
    );
}

#[tokio::test]
async fn file_fallback_goes_through_file_manager() {
    let shell = Arc::new(RecordingShell::default());
    let dispatcher = Dispatcher::new(Arc::new(FakeRuntime::default()), shell.clone(), empty_index());

    dispatcher
        .fallback(&Request::parse("/srv/share/plan.odt"))
        .await
        .unwrap();

    assert_eq!(
        *shell.opened.lock().unwrap(),
        vec!["manager:/srv/share/plan.odt".to_string()]
    );
}

#[tokio::test]
async fn shell_errors_become_handoff_failures() {
    let shell = Arc::new(RecordingShell {
        fail: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(Arc::new(FakeRuntime::default()), shell, empty_index());

    let error = dispatcher
        .fallback(&Request::parse("zzz:thing"))
        .await
        .unwrap_err();

    assert_eq!(error, DispatchError::ShellHandoffFailed("no association".to_string()));
}

#[tokio::test]
async fn matching_shortcut_wins_over_shell() {
    let dir = tempfile::tempdir().unwrap();
    let shortcut = dir.path().join("paint.desktop");
    std::fs::write(
        &shortcut,
        "[Desktop Entry]\nType=Application\nName=Paint Studio\nExec=/opt/paint/bin/paint %U\n",
    )
    .unwrap();

    let shell = Arc::new(RecordingShell::default());
    let dispatcher = Dispatcher::new(
        Arc::new(FakeRuntime::default()),
        shell.clone(),
        index_over(dir.path()),
    );

    let handled = dispatcher.fallback(&Request::parse("paint")).await.unwrap();

    assert_eq!(
        handled,
        Handled::Shortcut {
            name: "Paint Studio".to_string(),
            path: shortcut.clone()
        }
    );
    assert_eq!(
        *shell.opened.lock().unwrap(),
        vec![format!("path:{}", shortcut.display())]
    );
}
