// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::fs;
use tabprobe::config::{load_config_file, DEFAULT_RESYNC_TIMEOUT_MS};
use tabprobe::runner::ErrorCode;
use tabprobe::scenario::load_suite_file;
use tabprobe::{EncodingMode, Expectation};

#[test]
fn loads_yaml_suite_with_config_and_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(
        &path,
        r#"
name: schema names
shell:
  command: /usr/bin/fake
  args: ["--keyspace", "ks"]
  prompt: "\nfake:{context}> "
  context: ks
  encoding: lossy
config:
  response_budget_ms: 800
fixture:
  setup: ["echo create"]
  teardown: ["echo drop"]
tests:
  - name: drop keyspace
    probes:
      - input: 'DROP KEYSPACE "{context}" '
        expect: { choices: [";"] }
      - input: "zzz"
        expect: { no_choices: true }
"#,
    )
    .unwrap();

    let suite = load_suite_file(&path).unwrap();
    assert_eq!(suite.shell.encoding, EncodingMode::Lossy);
    assert_eq!(suite.shell.args, ["--keyspace", "ks"]);
    let config = suite.config.as_ref().unwrap();
    assert_eq!(config.response_budget_ms, 800);
    assert_eq!(config.resync_timeout_ms, DEFAULT_RESYNC_TIMEOUT_MS);
    assert_eq!(suite.fixture.as_ref().unwrap().teardown, ["echo drop"]);

    let probe = &suite.tests[0].probes[0];
    assert_eq!(probe.input_for(Some("ks")), "DROP KEYSPACE \"ks\" ");
    assert_eq!(probe.expect, Expectation::choices([";"]));
    assert_eq!(suite.tests[0].probes[1].expect, Expectation::NoChoices);
}

#[test]
fn loads_json_suite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.json");
    let suite = serde_json::json!({
        "name": "json",
        "shell": { "command": "/usr/bin/fake", "prompt": "\nfake:{context}> " },
        "tests": [{
            "name": "update",
            "probes": [{
                "input": "UPDATE users SET name = ",
                "expect": { "lines": ["<value for name (text)>"] }
            }]
        }]
    });
    fs::write(&path, serde_json::to_vec(&suite).unwrap()).unwrap();

    let suite = load_suite_file(&path).unwrap();
    assert_eq!(suite.shell.columns, 100_000);
    assert_eq!(
        suite.tests[0].probes[0].expect,
        Expectation::lines(["<value for name (text)>"])
    );
}

#[test]
fn malformed_expectation_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.yml");
    fs::write(
        &path,
        r#"
name: bad
shell: { command: /usr/bin/fake, prompt: "> " }
tests:
  - name: both
    probes:
      - input: "a"
        expect: { immediate: "b", choices: ["c"] }
"#,
    )
    .unwrap();
    let err = load_suite_file(&path).unwrap_err();
    assert_eq!(err.code, ErrorCode::Config);
}

#[test]
fn invalid_prompt_template_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(
        &path,
        r#"
name: bad prompt
shell: { command: /usr/bin/fake, prompt: "fake:(> " }
tests:
  - name: t
    probes:
      - { input: "a", expect: { no_choices: true } }
"#,
    )
    .unwrap();
    assert_eq!(load_suite_file(&path).unwrap_err().code, ErrorCode::Config);
}

#[test]
fn config_file_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("timing.yaml");
    fs::write(&good, "resync_timeout_ms: 2000\nresync_retry_timeout_ms: 20000\n").unwrap();
    let config = load_config_file(&good).unwrap();
    assert_eq!(config.resync_timeout_ms, 2_000);

    let bad = dir.path().join("timing.json");
    fs::write(&bad, r#"{"response_budget": 10}"#).unwrap();
    assert_eq!(load_config_file(&bad).unwrap_err().code, ErrorCode::Config);
}
