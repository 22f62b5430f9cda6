//! End-to-end builds from build files on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bakery::artifact::Artifact;
use bakery::build::{output_masker, script_hook, Build};
use bakery::config::{check_references, load_config_file, validate_config, BuildConfig};
use bakery::multistep::CancelToken;
use bakery::ui::MockUI;
use bakery::BakeryError;
use tempfile::TempDir;

/// Write `yaml` to a build file in `dir`, with `@LOG@` replaced by a log path.
fn write_build(dir: &Path, yaml: &str) -> (PathBuf, PathBuf) {
    let log = dir.join("build.log");
    let path = dir.join("bakery.yml");
    fs::write(&path, yaml.replace("@LOG@", &log.display().to_string())).unwrap();
    (path, log)
}

fn load(path: &Path) -> BuildConfig {
    let config = load_config_file(path).unwrap();
    assert!(validate_config(&config).is_empty());
    config
}

fn start(config: BuildConfig, ui: Arc<MockUI>) -> Build {
    let hook = Arc::new(script_hook(&config));
    Build::from_config(config, ui, hook)
}

fn log_lines(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn later_steps_read_what_earlier_steps_wrote() {
    let temp = TempDir::new().unwrap();
    let (path, log) = write_build(
        temp.path(),
        r#"
name: base
env:
  LOG: "@LOG@"
steps:
  - type: shell
    name: create volume
    run: ["echo vol-123"]
    output: volume_id
  - type: shell
    name: attach volume
    run: ["echo \"attach ${volume_id}\" >> \"$LOG\""]
"#,
    );
    let config = load(&path);
    assert!(check_references(&config, &Default::default()).is_empty());

    let ui = Arc::new(MockUI::new());
    let artifact = start(config, ui.clone()).run(&CancelToken::new()).unwrap();

    assert!(artifact.is_none());
    assert_eq!(log_lines(&log), vec!["attach vol-123"]);
    assert!(ui.has_say("Running create volume..."));
    assert!(ui.has_say("Running attach volume..."));
}

#[test]
fn failure_cleans_up_what_ran_in_reverse() {
    let temp = TempDir::new().unwrap();
    let (path, log) = write_build(
        temp.path(),
        r#"
env:
  LOG: "@LOG@"
steps:
  - type: shell
    name: a
    run: ["echo run-a >> \"$LOG\""]
    cleanup: ["echo clean-a >> \"$LOG\""]
  - type: shell
    name: b
    run: ["echo run-b >> \"$LOG\""]
    cleanup: ["echo clean-b >> \"$LOG\""]
  - type: shell
    name: c
    run: ["exit 4"]
    cleanup: ["echo clean-c >> \"$LOG\""]
  - type: shell
    name: d
    run: ["echo run-d >> \"$LOG\""]
    cleanup: ["echo clean-d >> \"$LOG\""]
"#,
    );

    let ui = Arc::new(MockUI::new());
    let result = start(load(&path), ui.clone()).run(&CancelToken::new());

    match result {
        Err(BakeryError::BuildFailed { message }) => {
            assert!(message.contains("exited with 4"), "{}", message)
        }
        other => panic!("expected BuildFailed, got {:?}", other.map(|a| a.is_some())),
    }
    assert_eq!(
        log_lines(&log),
        vec!["run-a", "run-b", "clean-c", "clean-b", "clean-a"]
    );
    assert!(ui.has_error("exited with 4"));
}

#[test]
fn failing_cleanup_is_reported_and_others_still_run() {
    let temp = TempDir::new().unwrap();
    let (path, log) = write_build(
        temp.path(),
        r#"
env:
  LOG: "@LOG@"
steps:
  - type: shell
    name: a
    run: ["true"]
    cleanup: ["echo clean-a >> \"$LOG\""]
  - type: shell
    name: b
    run: ["true"]
    cleanup: ["exit 9"]
"#,
    );

    let ui = Arc::new(MockUI::new());
    let result = start(load(&path), ui.clone()).run(&CancelToken::new());

    assert!(result.is_ok());
    assert_eq!(log_lines(&log), vec!["clean-a"]);
    assert!(ui.has_error("Error cleaning up 'b'"));
}

#[test]
fn wait_for_polls_until_the_target() {
    let temp = TempDir::new().unwrap();
    let counter = temp.path().join("count");
    let (path, _) = write_build(
        temp.path(),
        &format!(
            r#"
env:
  COUNTER: "{}"
steps:
  - type: wait_for
    name: snapshot
    refresh: >-
      n=$(cat "$COUNTER" 2>/dev/null || echo 0); n=$((n+1)); echo $n > "$COUNTER";
      if [ $n -ge 3 ]; then echo completed; else echo pending; fi
    pending: [pending]
    target: completed
    output: snapshot_state
    polling:
      delay_seconds: 0
      max_attempts: 10
"#,
            counter.display()
        ),
    );

    let ui = Arc::new(MockUI::new());
    start(load(&path), ui).run(&CancelToken::new()).unwrap();

    assert_eq!(fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[test]
fn wait_for_fails_on_an_unexpected_state() {
    let temp = TempDir::new().unwrap();
    let (path, _) = write_build(
        temp.path(),
        r#"
steps:
  - type: wait_for
    name: volume
    refresh: "echo error"
    pending: [creating]
    target: available
"#,
    );

    let ui = Arc::new(MockUI::new());
    let result = start(load(&path), ui).run(&CancelToken::new());

    match result {
        Err(BakeryError::BuildFailed { message }) => {
            assert!(message.contains("unexpected state 'error'"), "{}", message)
        }
        other => panic!("expected BuildFailed, got {:?}", other.map(|a| a.is_some())),
    }
}

#[test]
fn provisioner_output_is_masked() {
    let temp = TempDir::new().unwrap();
    let (path, _) = write_build(
        temp.path(),
        r#"
env:
  DEPLOY_TOKEN: tok-abc123
secrets: ["hunter2"]
provisioners:
  - "echo token=$DEPLOY_TOKEN"
  - "echo password=hunter2"
steps:
  - type: provision
"#,
    );
    let config = load(&path);
    let ui = Arc::new(MockUI::new().with_masker(output_masker(&config)));

    start(config, ui.clone()).run(&CancelToken::new()).unwrap();

    let lines = ui.all_lines().join("\n");
    assert!(!lines.contains("tok-abc123"), "{}", lines);
    assert!(!lines.contains("hunter2"), "{}", lines);
    assert!(ui.has_message("token=<sensitive>"));
    assert!(ui.has_message("password=<sensitive>"));
}

#[test]
fn local_commands_run_under_the_command_wrapper() {
    let temp = TempDir::new().unwrap();
    let (path, log) = write_build(
        temp.path(),
        r#"
command_wrapper: "sh -c 'echo wrapped >> \"$LOG\"' && {{.Command}}"
env:
  LOG: "@LOG@"
steps:
  - type: local_commands
    label: mount commands
    commands:
      - "echo mounted >> \"$LOG\""
"#,
    );

    let ui = Arc::new(MockUI::new());
    start(load(&path), ui.clone()).run(&CancelToken::new()).unwrap();

    assert_eq!(log_lines(&log), vec!["wrapped", "mounted"]);
    assert!(ui.has_say("Running mount commands..."));
}

#[test]
fn recorded_image_becomes_a_destroyable_artifact() {
    let temp = TempDir::new().unwrap();
    let (path, _) = write_build(
        temp.path(),
        r#"
name: base
builder_id: bakery.test
steps:
  - type: shell
    name: register
    run: ["echo ami-0abc"]
    output: image_id
  - type: record_image
    region: us-east-1
    image_id: "${image_id}"
"#,
    );

    let destroyed = Arc::new(Mutex::new(Vec::new()));
    let sink = destroyed.clone();
    let destroyer = move |region: &str, id: &str| -> bakery::Result<()> {
        sink.lock().unwrap().push(format!("{}:{}", region, id));
        Ok(())
    };

    let ui = Arc::new(MockUI::new());
    let artifact = start(load(&path), ui)
        .with_destroyer(Arc::new(destroyer))
        .run(&CancelToken::new())
        .unwrap()
        .unwrap();

    assert_eq!(artifact.builder_id(), "bakery.test");
    assert_eq!(artifact.id(), "us-east-1:ami-0abc");
    assert!(artifact.to_string().contains("us-east-1: ami-0abc"));

    artifact.destroy().unwrap();
    assert_eq!(*destroyed.lock().unwrap(), vec!["us-east-1:ami-0abc"]);
}

#[test]
fn unresolved_reference_is_caught_before_running() {
    let temp = TempDir::new().unwrap();
    let (path, _) = write_build(
        temp.path(),
        r#"
steps:
  - type: shell
    name: attach
    run: ["echo ${volume_id_that_nobody_sets}"]
  - type: shell
    name: create
    run: ["echo vol-1"]
    output: volume_id_that_nobody_sets
"#,
    );

    let config = load(&path);
    let problems = check_references(&config, &Default::default());
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].rule, "unresolved-reference");
}
