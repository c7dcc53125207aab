use std::fs;
use std::path::Path;

use rivet::{BridgeConfig, ErrorMode, Session};
use tempfile::tempdir;

fn config(root: &Path, mode: ErrorMode) -> BridgeConfig {
    BridgeConfig { cache_root: Some(root.to_path_buf()), error_mode: mode, ..Default::default() }
}

#[test]
fn fail_fast_mode_returns_errors_immediately() {
    let root = tempdir().expect("temp dir");
    let mut session = Session::new(config(root.path(), ErrorMode::FailFast));
    session.eval("broken ][").expect_err("fail fast");
    assert!(session.errors().is_empty());
}

#[test]
fn collect_mode_records_errors_and_keeps_going() {
    let root = tempdir().expect("temp dir");
    let mut session = Session::new(config(root.path(), ErrorMode::Collect));

    assert_eq!(session.eval("broken ][").expect("collected"), "");
    assert_eq!(session.eval("40 + 2").expect("later call unaffected"), "42");
    assert_eq!(session.eval("also broken ][").expect("collected"), "");

    assert_eq!(session.errors().len(), 2);
    assert!(session.last_error().is_some());

    let drained = session.take_errors();
    assert_eq!(drained.len(), 2);
    assert!(session.errors().is_empty());
}

#[test]
fn config_file_selects_the_error_mode() {
    let root = tempdir().expect("temp dir");
    let path = root.path().join("bridge.json");
    fs::write(
        &path,
        format!(
            r#"{{ "error_mode": "collect", "cache_root": {:?} }}"#,
            root.path().join("cache")
        ),
    )
    .expect("write config");

    let cfg = BridgeConfig::load(&path).expect("load");
    assert_eq!(cfg.error_mode, ErrorMode::Collect);
    assert_eq!(cfg.cache_root.as_deref(), Some(root.path().join("cache").as_path()));

    let mut session = Session::new(cfg);
    assert_eq!(session.eval("missing ][").expect("collect mode from file"), "");
    assert_eq!(session.errors().len(), 1);
    session.finalize().expect("finalize");
}
