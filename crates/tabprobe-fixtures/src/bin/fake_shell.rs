//! Fixture shell: a line editor with readline-style tab completion over a
//! small CQL-like vocabulary.
//!
//! Usage: `tabprobe-fake-shell [--keyspace <name>]`
//!
//! The prompt is `fake:<keyspace>> `. One TAB inserts a unique completion
//! (rewriting the word with backspaces when its case differs) or the longest
//! common prefix; otherwise it rings the bell and a second TAB lists the
//! candidates followed by a redrawn prompt. Ctrl-C prints `^C` and a fresh
//! prompt. `exit`, `quit`, or Ctrl-D on an empty line leave the shell.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]
#![allow(clippy::indexing_slicing)]

use nix::sys::termios::{self, SetArg, Termios};
use std::env;
use std::io::{self, Read, Write};

const BEL: u8 = 0x07;
const BACKSPACE: u8 = 0x08;
const TAB: u8 = b'\t';
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const DELETE: u8 = 0x7f;

fn main() -> io::Result<()> {
    let keyspace = parse_keyspace(env::args().skip(1)).unwrap_or_else(|| "tabprobe_ks".into());
    let saved = enter_raw_mode();

    let result = run(&keyspace);

    if let Some(saved) = saved {
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &saved).ok();
    }
    result
}

fn parse_keyspace(mut args: impl Iterator<Item = String>) -> Option<String> {
    while let Some(arg) = args.next() {
        if arg == "--keyspace" {
            return args.next();
        }
        if let Some(value) = arg.strip_prefix("--keyspace=") {
            return Some(value.to_string());
        }
    }
    None
}

/// Returns the previous settings, or `None` when stdin is not a terminal.
fn enter_raw_mode() -> Option<Termios> {
    let saved = termios::tcgetattr(io::stdin()).ok()?;
    let mut raw = saved.clone();
    termios::cfmakeraw(&mut raw);
    termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw).ok()?;
    Some(saved)
}

fn run(keyspace: &str) -> io::Result<()> {
    let mut shell = Shell::new(keyspace);
    let mut stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = [0u8; 256];

    stdout.write_all(shell.prompt().as_bytes())?;
    stdout.flush()?;

    loop {
        let count = stdin.read(&mut buffer)?;
        if count == 0 {
            return Ok(());
        }
        for &byte in &buffer[..count] {
            let (output, action) = shell.key(byte);
            stdout.write_all(&output)?;
            stdout.flush()?;
            if action == Action::Exit {
                return Ok(());
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Exit,
}

/// What one TAB press does to the current word.
#[derive(Debug, PartialEq, Eq)]
enum Completion {
    /// Bytes to emit and the line that results.
    Insert { output: Vec<u8>, line: String },
    /// Several candidates (or a hint); bell now, list on the next TAB.
    Ambiguous(Vec<String>),
    Nothing,
}

struct Shell {
    keyspace: String,
    line: String,
    /// Candidates withheld by the previous TAB.
    pending: Option<Vec<String>>,
}

impl Shell {
    fn new(keyspace: &str) -> Self {
        Self {
            keyspace: keyspace.to_string(),
            line: String::new(),
            pending: None,
        }
    }

    fn prompt(&self) -> String {
        format!("fake:{}> ", self.keyspace)
    }

    fn key(&mut self, byte: u8) -> (Vec<u8>, Action) {
        if byte != TAB {
            self.pending = None;
        }
        match byte {
            TAB => (self.tab(), Action::Continue),
            CTRL_C => {
                self.line.clear();
                (format!("^C\r\n{}", self.prompt()).into_bytes(), Action::Continue)
            }
            CTRL_D if self.line.is_empty() => (b"\r\n".to_vec(), Action::Exit),
            b'\r' | b'\n' => self.enter(),
            DELETE | BACKSPACE => {
                if self.line.pop().is_some() {
                    (b"\x08 \x08".to_vec(), Action::Continue)
                } else {
                    (vec![BEL], Action::Continue)
                }
            }
            byte if byte == b' ' || byte.is_ascii_graphic() => {
                self.line.push(char::from(byte));
                (vec![byte], Action::Continue)
            }
            _ => (Vec::new(), Action::Continue),
        }
    }

    fn tab(&mut self) -> Vec<u8> {
        if let Some(candidates) = self.pending.take() {
            let listing = format!(
                "\r\n{}\r\n{}{}",
                candidates.join("  "),
                self.prompt(),
                self.line
            );
            return listing.into_bytes();
        }
        match complete(&self.line, &self.keyspace) {
            Completion::Insert { output, line } => {
                self.line = line;
                output
            }
            Completion::Ambiguous(candidates) => {
                self.pending = Some(candidates);
                vec![BEL]
            }
            Completion::Nothing => vec![BEL],
        }
    }

    fn enter(&mut self) -> (Vec<u8>, Action) {
        let command = std::mem::take(&mut self.line);
        let command = command.trim().trim_end_matches(';');
        if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
            return (b"\r\n".to_vec(), Action::Exit);
        }
        let words: Vec<&str> = command.split_whitespace().collect();
        if let [use_kw, name] = words.as_slice() {
            if use_kw.eq_ignore_ascii_case("USE") {
                self.keyspace = name.trim_matches('"').to_string();
            }
        }
        (format!("\r\n{}", self.prompt()).into_bytes(), Action::Continue)
    }
}

fn complete(line: &str, keyspace: &str) -> Completion {
    let split = line.rfind(' ').map_or(0, |index| index + 1);
    let (head, partial) = line.split_at(split);
    let words: Vec<&str> = head.split_whitespace().collect();
    let candidates = candidates_after(&words, keyspace);

    let matches: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| starts_with_ignore_case(candidate, partial))
        .collect();

    match matches.as_slice() {
        [] => Completion::Nothing,
        [only] if !is_hint(only) => replace_word(head, partial, &format!("{only} ")),
        _ if matches.iter().any(|candidate| is_hint(candidate)) => Completion::Ambiguous(matches),
        _ => {
            let common = common_prefix(&matches);
            if common.len() > partial.len() {
                replace_word(head, partial, &common)
            } else {
                Completion::Ambiguous(matches)
            }
        }
    }
}

/// Hints describe what comes next instead of being inserted.
fn is_hint(candidate: &str) -> bool {
    candidate.starts_with('<') || candidate == ";"
}

fn replace_word(head: &str, partial: &str, replacement: &str) -> Completion {
    let output = match replacement.strip_prefix(partial) {
        Some(suffix) => suffix.as_bytes().to_vec(),
        None => {
            let mut bytes = vec![BACKSPACE; partial.len()];
            bytes.extend_from_slice(replacement.as_bytes());
            bytes
        }
    };
    Completion::Insert {
        output,
        line: format!("{head}{replacement}"),
    }
}

fn starts_with_ignore_case(candidate: &str, partial: &str) -> bool {
    candidate
        .get(..partial.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(partial))
}

fn common_prefix(candidates: &[String]) -> String {
    let Some((first, others)) = candidates.split_first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.chars().collect();
    for other in others {
        let shared = prefix
            .iter()
            .zip(other.chars())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

fn candidates_after(words: &[&str], keyspace: &str) -> Vec<String> {
    let upper: Vec<String> = words.iter().map(|word| word.to_ascii_uppercase()).collect();
    let upper: Vec<&str> = upper.iter().map(String::as_str).collect();
    let quoted = format!("\"{}\"", keyspace.to_ascii_uppercase());
    let list = |items: &[&str]| -> Vec<String> {
        items.iter().map(|item| (*item).to_string()).collect()
    };

    match upper.as_slice() {
        [] => list(&[
            "ALTER", "CREATE", "DELETE", "DESCRIBE", "DROP", "INSERT", "SELECT", "UPDATE", "USE",
            "exit", "quit",
        ]),
        ["DROP"] => list(&["INDEX", "KEYSPACE", "TABLE"]),
        ["DROP", "KEYSPACE"] => vec!["IF".into(), keyspace.to_string(), "system".into()],
        ["DROP", "KEYSPACE", name] if *name == quoted || name.eq_ignore_ascii_case(keyspace) => {
            list(&[";"])
        }
        ["DESCRIBE"] => list(&["KEYSPACE", "KEYSPACES", "TABLE", "TABLES"]),
        ["INSERT"] => list(&["INTO"]),
        ["INSERT", "INTO"] => list(&["empty_table", "songs", "users"]),
        ["USE"] => vec![keyspace.to_string(), "system".into()],
        ["SELECT"] => list(&["*", "DISTINCT", "JSON"]),
        ["UPDATE"] => list(&["songs", "users"]),
        ["UPDATE", _] => list(&["SET", "USING"]),
        ["UPDATE", "USERS", "SET"] => list(&["age", "name"]),
        ["UPDATE", "USERS", "SET", column, "="] => {
            let kind = if *column == "AGE" { "int" } else { "text" };
            vec![format!("<value for {} ({kind})>", column.to_ascii_lowercase())]
        }
        _ => Vec::new(),
    }
}
