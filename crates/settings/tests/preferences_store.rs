use neoeditor_settings::{Preferences, PreferencesStore};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let store = PreferencesStore::load(&path).expect("load defaults");
    let prefs = store.preferences();
    assert!(prefs.session.restore_on_startup);
    assert_eq!(prefs.session.store_file, "session-store.json");
    assert_eq!(prefs.session.key, "session");
    assert_eq!(prefs.logging.level, "warn");
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("config").join("preferences.json");

    let mut store = PreferencesStore::new(path.clone(), Preferences::default());
    store
        .update(|prefs| {
            prefs.session.restore_on_startup = false;
            prefs.session.key = "workspace-a".to_string();
            prefs.logging.level = "DEBUG".to_string();
        })
        .expect("save");

    let reloaded = PreferencesStore::load(&path).expect("reload");
    assert!(!reloaded.preferences().session.restore_on_startup);
    assert_eq!(reloaded.preferences().session.key, "workspace-a");
    assert_eq!(reloaded.preferences().logging.level, "debug");
}

#[test]
fn invalid_values_are_sanitized_on_load() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "session": { "store_file": "  ", "key": "" },
            "logging": { "level": "chatty" }
        }"#,
    )
    .expect("write legacy prefs");

    let store = PreferencesStore::load(&path).expect("load legacy file");
    let prefs = store.preferences();
    assert_eq!(prefs.version, 1, "version 0 should be upgraded");
    assert!(
        prefs.session.restore_on_startup,
        "missing flag should default to true"
    );
    assert_eq!(prefs.session.store_file, "session-store.json");
    assert_eq!(prefs.session.key, "session");
    assert_eq!(prefs.logging.level, "warn");
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(&path, "not json").expect("write");

    let err = PreferencesStore::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse preferences"));
}

#[test]
fn store_file_must_be_a_plain_name_apart_from_preferences() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let rejected = [
        "preferences.json",
        "PREFERENCES.JSON",
        "../escape.json",
        "nested/store.json",
        "..",
    ];
    for bad in rejected {
        let payload = format!(r#"{{ "session": {{ "store_file": "{bad}" }} }}"#);
        fs::write(&path, payload).expect("write prefs");
        let store = PreferencesStore::load(&path).expect("load");
        assert_eq!(
            store.preferences().session.store_file,
            "session-store.json",
            "{bad} should fall back to the default"
        );
    }

    fs::write(&path, r#"{ "session": { "store_file": "workspace-a.json" } }"#)
        .expect("write prefs");
    let store = PreferencesStore::load(&path).expect("load");
    assert_eq!(store.preferences().session.store_file, "workspace-a.json");
}
