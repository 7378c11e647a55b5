use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use handoff_core::shell_opener::{existing_path, LaunchError, ShellOpener, SystemShell};

fn unique_temp_path(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "handoff-{label}-{}-{unique}.tmp",
        std::process::id()
    ))
}

#[test]
fn rejects_empty_targets() {
    assert_eq!(SystemShell.open_uri("   "), Err(LaunchError::EmptyPath));
    assert_eq!(SystemShell.open_path(""), Err(LaunchError::EmptyPath));
    assert_eq!(SystemShell.open_in_file_manager(""), Err(LaunchError::EmptyPath));
}

#[test]
fn rejects_missing_paths_before_launching() {
    let missing = unique_temp_path("missing-path");
    let missing_str = missing.to_string_lossy().to_string();

    assert_eq!(
        SystemShell.open_path(&missing_str),
        Err(LaunchError::MissingPath(missing.clone()))
    );
    assert_eq!(
        SystemShell.open_in_file_manager(&missing_str),
        Err(LaunchError::MissingPath(missing))
    );
}

#[test]
fn existing_path_trims_and_accepts_real_files() {
    let file_path = unique_temp_path("existing-path");
    std::fs::write(&file_path, b"ok").expect("should create temp file");
    let padded = format!("  {}  ", file_path.display());

    let result = existing_path(&padded).map(str::to_string);
    std::fs::remove_file(&file_path).expect("should clean temp file");

    assert_eq!(result, Ok(file_path.to_string_lossy().to_string()));
}
