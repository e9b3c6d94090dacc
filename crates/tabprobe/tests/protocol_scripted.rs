// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::collections::BTreeSet;
use tabprobe::config::HarnessConfig;
use tabprobe::protocol::{CompletionProbe, ProbeState, BEL, CTRL_C, TAB};
use tabprobe::prompt::PromptPattern;
use tabprobe::runner::ErrorCode;
use tabprobe::session::Session;
use tabprobe::transport::ScriptedTransport;
use tabprobe::{CompletionResult, EncodingMode, Expectation, SessionConfig};

const RESYNC: &str = "^C\r\nfake:ks> ";

fn shell() -> SessionConfig {
    SessionConfig::new("fake", "\nfake:{context}> ").with_context("ks")
}

fn prompt() -> PromptPattern {
    PromptPattern::new("\nfake:{context}> ", Some("ks".into())).unwrap()
}

fn session(transport: ScriptedTransport) -> Session<ScriptedTransport> {
    Session::with_transport(transport, &shell(), HarnessConfig::default()).unwrap()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

#[test]
fn immediate_completion_is_returned_after_one_tab() {
    let mut transport = ScriptedTransport::new().reply("alt\u{8}\u{8}\u{8}ALTER ");
    let config = HarnessConfig::default();
    let prompt = prompt();
    let result = CompletionProbe::new("alt", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap();
    assert_eq!(result, CompletionResult::immediate("\u{8}\u{8}\u{8}ALTER "));
    assert_eq!(transport.writes(), [b"alt".to_vec(), vec![TAB]]);
}

#[test]
fn erase_pairs_and_bells_are_not_immediate_text() {
    let mut transport = ScriptedTransport::new()
        .reply("SELECT  \u{8}\u{7}")
        .reply("\r\nDISTINCT  JSON\r\nfake:ks> SELECT ")
        .reply(RESYNC);
    let config = HarnessConfig::default();
    let prompt = prompt();
    let result = CompletionProbe::new("SELECT ", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap();
    assert_eq!(result.tokens().unwrap(), set(&["DISTINCT", "JSON"]));
}

#[test]
fn listed_completion_sends_second_tab_then_cancels() {
    let mut transport = ScriptedTransport::new()
        .reply("DROP KEYSPACE \u{7}")
        .reply("\r\nIF  ks  system\r\nfake:ks> DROP KEYSPACE ")
        .reply(RESYNC);
    let config = HarnessConfig::default();
    let prompt = prompt();
    let mut probe = CompletionProbe::new("DROP KEYSPACE ", &prompt, &config, EncodingMode::Strict);
    while !probe.state().is_resolved() {
        probe.step(&mut transport).unwrap();
    }
    assert!(matches!(probe.state(), ProbeState::ListResolved(_)));
    let result = probe.finish().unwrap();

    assert_eq!(result.tokens().unwrap(), set(&["IF", "ks", "system"]));
    assert_eq!(result.lines().unwrap(), ["IF  ks  system"]);
    assert_eq!(
        transport.writes(),
        [b"DROP KEYSPACE ".to_vec(), vec![TAB], vec![TAB], vec![CTRL_C]]
    );
}

#[test]
fn lone_bell_after_second_tab_is_empty() {
    let mut transport = ScriptedTransport::new()
        .reply("zzz\u{7}")
        .reply([BEL])
        .reply(RESYNC);
    let config = HarnessConfig::default();
    let prompt = prompt();
    let result = CompletionProbe::new("zzz", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap();
    assert_eq!(result, CompletionResult::Empty);
}

#[test]
fn closed_stream_is_not_empty() {
    let mut transport = ScriptedTransport::new().reply("zzz").closed();
    let config = HarnessConfig::default();
    let prompt = prompt();
    let err = CompletionProbe::new("zzz", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StreamClosed);
}

#[test]
fn missing_echo_is_protocol_violation() {
    let mut transport = ScriptedTransport::new().reply("sel");
    let config = HarnessConfig::default();
    let prompt = prompt();
    let err = CompletionProbe::new("SEL", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProtocolViolation);
    let context = err.context.unwrap();
    assert_eq!(context["input"], "SEL");
}

#[test]
fn list_without_prompt_redraw_is_protocol_violation() {
    let mut transport = ScriptedTransport::new()
        .reply("DROP ")
        .reply("\r\nINDEX  KEYSPACE  TABLE\r\n")
        .reply(RESYNC);
    let config = HarnessConfig::default();
    let prompt = prompt();
    let err = CompletionProbe::new("DROP ", &prompt, &config, EncodingMode::Strict)
        .run(&mut transport)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProtocolViolation);
}

#[test]
fn session_with_escaped_newline_prompt_lists_candidates() {
    let shell = SessionConfig::new("fake", r"\nfake:{context}> ").with_context("ks");
    let transport = ScriptedTransport::new()
        .reply("fake:ks> ")
        .reply("DROP \u{7}")
        .reply("\r\nINDEX  KEYSPACE  TABLE\r\n\x1b[?2004hfake:ks> DROP ")
        .reply(RESYNC)
        .reply(RESYNC);
    let mut session = Session::with_transport(transport, &shell, HarnessConfig::default()).unwrap();
    session.wait_for_startup_prompt().unwrap();
    let verdict = session
        .try_completions("DROP ", &Expectation::choices(["INDEX", "KEYSPACE", "TABLE"]))
        .unwrap();
    assert!(verdict.outcome.passed(), "{:?}", verdict.outcome);
    assert_eq!(session.transport().remaining(), 0);
}

#[test]
fn invalid_utf8_depends_on_encoding_mode() {
    let script = || {
        ScriptedTransport::new()
            .reply("caf")
            .reply(b"\r\ncaf\xff\r\nfake:ks> caf")
            .reply(RESYNC)
    };
    let config = HarnessConfig::default();
    let prompt = prompt();

    let mut strict = script();
    let err = CompletionProbe::new("caf", &prompt, &config, EncodingMode::Strict)
        .run(&mut strict)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TerminalParse);
    // the line is cancelled even though the list could not be decoded
    assert_eq!(strict.writes().last(), Some(&vec![CTRL_C]));
    assert_eq!(strict.remaining(), 0);

    let lossy = CompletionProbe::new("caf", &prompt, &config, EncodingMode::Lossy)
        .run(&mut script())
        .unwrap();
    assert_eq!(lossy.lines().unwrap(), ["caf\u{fffd}"]);
}

#[test]
fn consecutive_probes_each_end_at_a_prompt() {
    let transport = ScriptedTransport::new()
        // "alt": immediate, then the session's cancel
        .reply("alt\u{8}\u{8}\u{8}ALTER ")
        .reply(RESYNC)
        // "": listed, protocol cancel, then the session's cancel
        .reply("\u{7}")
        .reply("\r\nALTER  INSERT  SELECT\r\nfake:ks> ")
        .reply(RESYNC)
        .reply(RESYNC);
    let mut session = session(transport);

    let first = session
        .try_completions("alt", &Expectation::immediate("\u{8}\u{8}\u{8}ALTER "))
        .unwrap();
    assert!(first.outcome.passed());

    let second = session
        .try_completions("", &Expectation::choices_including(["SELECT", "INSERT"]))
        .unwrap();
    assert!(second.outcome.passed(), "{:?}", second.outcome);

    let cancels = session
        .transport()
        .writes()
        .iter()
        .filter(|write| write.as_slice() == [CTRL_C])
        .count();
    assert_eq!(cancels, 3);
    assert_eq!(session.transport().remaining(), 0);
}

#[test]
fn match_failure_still_recovers() {
    let transport = ScriptedTransport::new()
        .reply("DROP KEYSPACE \"ks\" ")
        .reply("\r\n;\r\nfake:ks> DROP KEYSPACE \"ks\" ")
        .reply(RESYNC)
        .reply(RESYNC);
    let mut session = session(transport);
    let verdict = session
        .try_completions("DROP KEYSPACE \"{context}\" ", &Expectation::choices(["IF"]))
        .unwrap();
    assert_eq!(verdict.input, "DROP KEYSPACE \"ks\" ");
    assert!(!verdict.outcome.passed());
    assert_eq!(session.transport().remaining(), 0);
}

#[test]
fn recovery_retries_once_then_gives_up() {
    let transport = ScriptedTransport::new()
        .reply("alt\u{8}\u{8}\u{8}ALTER ")
        .silence()
        .silence();
    let mut session = session(transport);
    let err = session
        .try_completions("alt", &Expectation::immediate("ALTER "))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(err.code.is_fatal());
}
