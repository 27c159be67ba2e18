use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn cli(workspace: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("neoeditor-cli")?;
    cmd.current_dir(workspace)
        .env_remove("RUST_LOG")
        .arg("--workspace")
        .arg(workspace);
    Ok(cmd)
}

fn status(workspace: &Path) -> Result<Value, Box<dyn Error>> {
    let output = cli(workspace)?.arg("status").output()?;
    assert!(output.status.success());
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn session_survives_between_invocations() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::create_dir(root.join("src"))?;
    fs::write(root.join("src").join("main.rs"), "fn main() {}\n")?;
    fs::write(root.join("README.md"), "# demo\n")?;

    cli(root)?
        .args(["open-folder", "src"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened folder"));
    cli(root)?.args(["open", "src/main.rs"]).assert().success();
    cli(root)?.args(["open", "README.md"]).assert().success();
    cli(root)?.args(["select", "src/main.rs"]).assert().success();

    let session = status(root)?;
    let src = root.join("src");
    assert_eq!(strings(&session["folders"]), vec![src.display().to_string()]);
    assert_eq!(
        strings(&session["files"]),
        vec![
            src.join("main.rs").display().to_string(),
            root.join("README.md").display().to_string(),
        ]
    );
    assert_eq!(
        session["current_file"].as_str(),
        Some(src.join("main.rs").display().to_string().as_str())
    );
    assert!(root.join(".neoeditor").join("session-store.json").exists());
    Ok(())
}

#[test]
fn rename_and_delete_follow_open_tabs() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::create_dir_all(root.join("a").join("b"))?;
    fs::write(root.join("a").join("b").join("x.txt"), "x")?;
    fs::write(root.join("a").join("gone.txt"), "bye")?;

    cli(root)?.args(["open-folder", "a"]).assert().success();
    cli(root)?.args(["open", "a/b/x.txt"]).assert().success();
    cli(root)?.args(["open", "a/gone.txt"]).assert().success();

    cli(root)?
        .args(["rename", "a/b", "a/c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed"));
    cli(root)?.args(["delete", "a/gone.txt"]).assert().success();

    let session = status(root)?;
    assert_eq!(
        strings(&session["files"]),
        vec![root.join("a").join("c").join("x.txt").display().to_string()]
    );
    assert!(!root.join("a").join("gone.txt").exists());
    Ok(())
}

#[test]
fn tree_lists_created_entries() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::create_dir(root.join("proj"))?;

    cli(root)?.args(["open-folder", "proj"]).assert().success();
    cli(root)?.args(["new-folder", "proj", "docs"]).assert().success();
    cli(root)?.args(["new-file", "proj/docs", "intro.md"]).assert().success();
    cli(root)?.args(["new-file", "proj", "notes.txt"]).assert().success();

    cli(root)?
        .args(["tree", "--expand", "proj/docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("proj/\n  docs/\n    intro.md\n  notes.txt\n"));

    let session = status(root)?;
    assert!(strings(&session["files"]).is_empty(), "new files are not opened");
    Ok(())
}

#[test]
fn failed_open_reports_error_and_keeps_session() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::write(root.join("kept.txt"), "kept")?;

    cli(root)?.args(["open", "kept.txt"]).assert().success();
    cli(root)?
        .args(["open", "missing.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    cli(root)?
        .args(["open-folder", "kept.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));

    let session = status(root)?;
    assert_eq!(
        strings(&session["files"]),
        vec![root.join("kept.txt").display().to_string()]
    );
    Ok(())
}

#[test]
fn vanished_folder_is_skipped_on_restore() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::create_dir(root.join("temp"))?;
    fs::create_dir(root.join("stay"))?;

    cli(root)?.args(["open-folder", "temp"]).assert().success();
    cli(root)?.args(["open-folder", "stay"]).assert().success();
    fs::remove_dir(root.join("temp"))?;

    cli(root)?
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("skipped"));
    let session = status(root)?;
    assert_eq!(
        strings(&session["folders"]),
        vec![root.join("stay").display().to_string()]
    );
    Ok(())
}

#[test]
fn restore_can_be_disabled_in_preferences() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path();
    fs::write(root.join("a.txt"), "a")?;
    cli(root)?.args(["open", "a.txt"]).assert().success();

    fs::write(
        root.join(".neoeditor").join("preferences.json"),
        r#"{ "session": { "restore_on_startup": false } }"#,
    )?;

    let session = status(root)?;
    assert!(strings(&session["files"]).is_empty());
    Ok(())
}
