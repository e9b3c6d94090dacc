//! Tests for argument parsing, color flags and shell completions.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::process::Command;

fn tabprobe_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tabprobe"))
}

#[test]
fn help_lists_subcommands() {
    let output = tabprobe_bin()
        .arg("--help")
        .output()
        .expect("failed to execute");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "probe", "completions"] {
        assert!(stdout.contains(command), "missing {command} in help: {stdout}");
    }
}

#[test]
fn color_flag_accepts_known_modes() {
    for mode in ["auto", "always", "never"] {
        let output = tabprobe_bin()
            .arg(format!("--color={mode}"))
            .arg("--help")
            .output()
            .expect("failed to execute");
        assert!(
            output.status.success(),
            "--color={mode} should be accepted: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn color_flag_rejects_invalid() {
    let output = tabprobe_bin()
        .arg("--color=sometimes")
        .arg("--help")
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
}

#[test]
fn probe_requires_a_command() {
    let output = tabprobe_bin()
        .args(["probe", "--prompt", "> "])
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
}

#[test]
fn completions_generate_for_bash() {
    let output = tabprobe_bin()
        .args(["completions", "bash"])
        .output()
        .expect("failed to execute");
    assert!(output.status.success());
    let script = String::from_utf8_lossy(&output.stdout);
    assert!(script.contains("tabprobe"));
}
