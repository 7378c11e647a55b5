use handoff_core::config::{self, Config, ConfigError, ShortcutRoot};

#[test]
fn rejects_shortcut_ttl_out_of_range() {
    let zero = Config {
        shortcut_cache_ttl_secs: 0,
        ..Default::default()
    };
    assert!(config::validate(&zero).is_err());

    let too_long = Config {
        shortcut_cache_ttl_secs: 86_401,
        ..Default::default()
    };
    assert!(config::validate(&too_long).is_err());
}

#[test]
fn accepts_default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.shortcut_cache_ttl_secs, 300);
    assert!(cfg.database_path.to_string_lossy().contains("handoff"));
    assert!(cfg.config_path.to_string_lossy().contains("handoff"));
    assert!(config::validate(&cfg).is_ok());
}

#[test]
fn empty_roots_mean_platform_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.effective_shortcut_roots(), config::default_shortcut_roots());

    let custom = Config {
        shortcut_roots: vec![ShortcutRoot::flat("/srv/menu")],
        ..Default::default()
    };
    assert_eq!(custom.effective_shortcut_roots(), vec![ShortcutRoot::flat("/srv/menu")]);
}

#[test]
fn missing_file_loads_defaults_with_that_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.toml");

    let cfg = config::load(Some(&path)).unwrap();

    assert_eq!(cfg.config_path, path);
    assert_eq!(cfg.shortcut_cache_ttl_secs, 300);
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        database_path: dir.path().join("db.sqlite3"),
        shortcut_cache_ttl_secs: 60,
        shortcut_roots: vec![ShortcutRoot::recursive(dir.path().join("menu"))],
        config_path: dir.path().join("nested").join("handoff.toml"),
        ..Default::default()
    };

    config::save(&cfg).unwrap();
    let loaded = config::load(Some(&cfg.config_path)).unwrap();

    assert_eq!(loaded, cfg);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.toml");
    std::fs::write(&path, "shortcut_cache_ttl_secs = 30\n").unwrap();

    let cfg = config::load(Some(&path)).unwrap();

    assert_eq!(cfg.shortcut_cache_ttl_secs, 30);
    assert_eq!(cfg.log_dir, Config::default().log_dir);
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.toml");
    std::fs::write(&path, "shortcut_cache_ttl_secs = 0\n").unwrap();
    assert!(matches!(config::load(Some(&path)), Err(ConfigError::Invalid(_))));

    std::fs::write(&path, "shortcut_cache_ttl_secs = \"soon\"\n").unwrap();
    assert!(matches!(config::load(Some(&path)), Err(ConfigError::Parse(_))));
}

#[test]
fn opens_store_from_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        database_path: dir.path().join("state").join("handlers.sqlite3"),
        ..Default::default()
    };

    let store = handoff_core::store::Store::open_from_config(&cfg).unwrap();
    store.close().unwrap();

    assert!(cfg.database_path.exists());
}
