use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;

struct CliTree {
    temp_dir: TempDir,
}

impl CliTree {
    fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("work"))?;
        Ok(Self { temp_dir })
    }

    fn root(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    fn config(&self) -> PathBuf {
        self.temp_dir.path().join("config.toml")
    }

    fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn cmd(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("snaptrack")?;
        cmd.arg("--root")
            .arg(self.root())
            .arg("--config")
            .arg(self.config())
            .env_remove("SNAPTRACK_LOG");
        Ok(cmd)
    }

    fn snapshot_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = fs::read_dir(self.root().join(".saves"))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn meta_comment(dir: &Path) -> Result<String> {
    let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(dir.join("meta.json"))?)?;
    Ok(meta["comment"].as_str().unwrap_or_default().to_string())
}

#[test]
fn test_init_creates_initial_snapshot() -> Result<()> {
    let tree = CliTree::new()?;
    tree.write("a.txt", "x")?;

    tree.cmd()?
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Initialized"));

    let ids = tree.snapshot_ids()?;
    assert_eq!(ids.len(), 1);
    let snapshot = tree.root().join(".saves").join(&ids[0]);
    assert_eq!(fs::read_to_string(snapshot.join("a.txt"))?, "x");
    assert_eq!(meta_comment(&snapshot)?, "Initial state");
    assert!(!tree.root().join(".tracker_status").exists());
    assert!(tree.config().exists(), "default config is written on first run");

    tree.cmd()?
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Already initialized"));
    assert_eq!(tree.snapshot_ids()?.len(), 1);

    Ok(())
}

#[test]
fn test_commands_require_init() -> Result<()> {
    let tree = CliTree::new()?;

    tree.cmd()?
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("snaptrack init"));

    Ok(())
}

#[test]
fn test_status_save_list_restore() -> Result<()> {
    let tree = CliTree::new()?;
    tree.write("a.txt", "x")?;
    tree.cmd()?.arg("init").assert().success();
    let first = tree.snapshot_ids()?.remove(0);

    tree.write("a.txt", "y")?;
    tree.write("b.txt", "new")?;
    tree.cmd()?
        .args(["status", "--short"])
        .assert()
        .success()
        .stdout("A b.txt\nM a.txt\n");

    tree.cmd()?
        .args(["save", "-m", "checkpoint"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved snapshot"));

    tree.cmd()?.args(["status", "--short"]).assert().success().stdout("");

    tree.cmd()?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initial state").and(predicate::str::contains("checkpoint")));

    tree.cmd()?
        .args(["show", &first])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt").and(predicate::str::contains("b.txt").not()));

    tree.cmd()?.args(["restore", &first]).assert().success();
    assert_eq!(fs::read_to_string(tree.root().join("a.txt"))?, "x");
    assert!(tree.root().join("b.txt").exists(), "overlay keeps extra files");

    tree.cmd()?.args(["restore", &first, "--reconcile"]).assert().success();
    assert!(!tree.root().join("b.txt").exists());

    Ok(())
}

#[test]
fn test_restore_rejects_bad_ids() -> Result<()> {
    let tree = CliTree::new()?;
    tree.cmd()?.arg("init").assert().success();

    tree.cmd()?
        .args(["restore", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYYMMDD_HHMMSS"));

    tree.cmd()?
        .args(["restore", "19990101_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("19990101_000000"));

    Ok(())
}

#[test]
fn test_verify_reports_corruption() -> Result<()> {
    let tree = CliTree::new()?;
    tree.write("a.txt", "x")?;
    tree.cmd()?.arg("init").assert().success();
    let id = tree.snapshot_ids()?.remove(0);

    tree.cmd()?
        .args(["verify", &id])
        .assert()
        .success()
        .stderr(predicate::str::contains("intact"));

    fs::write(tree.root().join(".saves").join(&id).join("a.txt"), "tampered")?;
    tree.cmd()?
        .args(["verify", &id])
        .assert()
        .failure()
        .stdout(predicate::str::contains("corrupted"));

    Ok(())
}

#[test]
fn test_autosave_settings_persist() -> Result<()> {
    let tree = CliTree::new()?;

    tree.cmd()?
        .args(["autosave", "--enable", "--interval", "5"])
        .assert()
        .success();
    let config = fs::read_to_string(tree.config())?;
    assert!(config.contains("autosave_enabled = true"));
    assert!(config.contains("autosave_interval_minutes = 5"));

    tree.cmd()?
        .arg("autosave")
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled").and(predicate::str::contains("5 minute")));

    tree.cmd()?
        .args(["autosave", "--interval", "61"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 60"));
    assert!(fs::read_to_string(tree.config())?.contains("autosave_interval_minutes = 5"));

    Ok(())
}

#[test]
fn test_watch_session_over_stdin() -> Result<()> {
    let tree = CliTree::new()?;
    tree.write("a.txt", "x")?;

    tree.cmd()?
        .arg("watch")
        .write_stdin("status\nsave from watch\nlist\nautosave on 3\nquit\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ok watching")
                .and(predicate::str::contains("ok saved"))
                .and(predicate::str::contains("ok 2 snapshot(s)"))
                .and(predicate::str::contains("ok autosave on every 3 minute(s)"))
                .and(predicate::str::contains("ok bye")),
        );

    assert!(!tree.root().join(".tracker_status").exists());
    Ok(())
}

#[test]
fn test_save_and_restore_refused_during_watch() -> Result<()> {
    let tree = CliTree::new()?;
    tree.write("a.txt", "x")?;
    tree.cmd()?.arg("init").assert().success();
    let first = tree.snapshot_ids()?[0].clone();

    let mut watch = std::process::Command::new(env!("CARGO_BIN_EXE_snaptrack"))
        .arg("--root")
        .arg(tree.root())
        .arg("--config")
        .arg(tree.config())
        .arg("watch")
        .env_remove("SNAPTRACK_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let mut session_output = BufReader::new(watch.stdout.take().expect("piped stdout"));
    let mut banner = String::new();
    session_output.read_line(&mut banner)?;
    assert!(banner.starts_with("ok watching"), "unexpected banner: {banner:?}");

    tree.write("a.txt", "y")?;
    tree.cmd()?
        .args(["save", "-m", "while watching"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("another session"));
    tree.cmd()?
        .args(["restore", &first])
        .assert()
        .failure()
        .stderr(predicate::str::contains("another session"));
    tree.cmd()?.arg("status").assert().success();
    assert_eq!(fs::read_to_string(tree.root().join("a.txt"))?, "y");
    assert_eq!(tree.snapshot_ids()?.len(), 1);

    // Closing stdin ends the watch session and frees the tree
    drop(watch.stdin.take());
    let mut rest = String::new();
    session_output.read_to_string(&mut rest)?;
    assert!(rest.contains("ok bye"));
    assert!(watch.wait()?.success());
    tree.cmd()?.args(["save", "-m", "after watch"]).assert().success();
    assert_eq!(tree.snapshot_ids()?.len(), 2);

    Ok(())
}

#[test]
fn test_watch_ends_on_eof() -> Result<()> {
    let tree = CliTree::new()?;

    tree.cmd()?
        .arg("watch")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok bye"));

    Ok(())
}

#[test]
#[serial]
fn test_config_path_from_environment() -> Result<()> {
    let tree = CliTree::new()?;
    let env_config = tree.temp_dir.path().join("from-env.toml");
    fs::write(
        &env_config,
        "[store]\ndir_name = \".snapshots\"\nmarker_name = \".session\"\n",
    )?;

    Command::cargo_bin("snaptrack")?
        .arg("--root")
        .arg(tree.root())
        .env("SNAPTRACK_CONFIG_PATH", &env_config)
        .arg("init")
        .assert()
        .success();

    assert!(tree.root().join(".snapshots").is_dir());
    assert!(!tree.root().join(".saves").exists());
    Ok(())
}

#[test]
fn test_completion_needs_no_tree() -> Result<()> {
    Command::cargo_bin("snaptrack")?
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("snaptrack"));
    Ok(())
}
