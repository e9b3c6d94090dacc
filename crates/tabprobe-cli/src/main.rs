//! tabprobe CLI: run tab-completion suites against an interactive shell.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes
#![allow(clippy::fn_params_excessive_bools)] // CLI flags are naturally bools

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabprobe::config::{load_config_file, HarnessConfig};
use tabprobe::runner::{run_suite, HarnessError, ProgressCallback, RunnerOptions};
use tabprobe::scenario::load_suite_file;
use tabprobe::session::Session;
use tabprobe::{CompletionResult, EncodingMode, RunStatus, SessionConfig, SuiteReport};
use tracing_subscriber::EnvFilter;

mod progress;

/// Exit code when a suite ran but at least one probe did not match.
const EXIT_FAILED: i32 = 1;
/// Exit code when a suite could not run one of its probes.
const EXIT_ERRORED: i32 = 2;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "tabprobe",
    version,
    about = "Verify interactive tab completion of a shell over a PTY"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a completion suite (YAML or JSON)
    Run {
        #[arg(long)]
        suite: PathBuf,
        #[arg(long, help = "Timing configuration file; replaces the suite's config block")]
        config: Option<PathBuf>,
        #[arg(long, help = "Print the suite report as JSON on stdout")]
        json: bool,
    },
    /// Probe a single input and print what the shell completed
    Probe {
        #[arg(long, help = "Prompt regex; {context} is replaced by --context")]
        prompt: String,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value = "", help = "Text typed before TAB")]
        input: String,
        #[arg(long, help = "Print candidate lines instead of tokens")]
        lines: bool,
        #[arg(long, help = "Replace invalid UTF-8 instead of failing")]
        lossy: bool,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Run {
            suite,
            config,
            json,
        } => cmd_run(&suite, config, json, cli.verbose),
        Commands::Probe {
            prompt,
            context,
            input,
            lines,
            lossy,
            config,
            json,
            command,
        } => cmd_probe(
            ProbeArgs {
                prompt,
                context,
                input,
                lines,
                lossy,
                config,
            },
            json,
            command,
        ),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_run(suite_path: &Path, config: Option<PathBuf>, json: bool, verbose: bool) -> Result<()> {
    let suite = match load_suite_file(suite_path) {
        Ok(suite) => suite,
        Err(err) => return emit_error(json, &err),
    };
    let config = match config.as_deref().map(load_config_file).transpose() {
        Ok(config) => config,
        Err(err) => return emit_error(json, &err),
    };
    let progress = if verbose && !json {
        Some(Arc::new(progress::VerboseProgress::new()) as Arc<dyn ProgressCallback>)
    } else {
        None
    };
    let options = RunnerOptions { config, progress };
    match run_suite(&suite, options) {
        Ok(report) => emit_report(json, &report),
        Err(err) => emit_error(json, &err),
    }
}

struct ProbeArgs {
    prompt: String,
    context: Option<String>,
    input: String,
    lines: bool,
    lossy: bool,
    config: Option<PathBuf>,
}

fn cmd_probe(args: ProbeArgs, json: bool, command: Vec<String>) -> Result<()> {
    let mut command = command.into_iter();
    let Some(program) = command.next() else {
        return emit_error(json, &HarnessError::cli_invalid_arg("missing command"));
    };
    let mut shell = SessionConfig::new(program, args.prompt).with_args(command);
    shell.context = args.context;
    if args.lossy {
        shell.encoding = EncodingMode::Lossy;
    }

    let result = probe_once(&shell, args.config, &args.input);
    match result {
        Ok(result) => {
            if json {
                let payload = serde_json::to_string(&result).into_diagnostic()?;
                println!("{payload}");
            } else {
                print_completion(&result, args.lines);
            }
            Ok(())
        }
        Err(err) => emit_error(json, &err),
    }
}

fn probe_once(
    shell: &SessionConfig,
    config: Option<PathBuf>,
    input: &str,
) -> Result<CompletionResult, HarnessError> {
    let harness = match config {
        Some(path) => load_config_file(&path)?,
        None => HarnessConfig::default(),
    }
    .with_env_overrides()?;
    let mut session = Session::spawn(shell, harness)?;
    let result = session.get_completions(input);
    if let Err(err) = session.close() {
        tracing::warn!(error = %err, "failed to stop shell cleanly");
    }
    result
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_completion(result: &CompletionResult, by_line: bool) {
    match result {
        CompletionResult::Immediate { text } => println!("immediate: {text:?}"),
        CompletionResult::Listed { tokens, lines } => {
            if by_line {
                for line in lines {
                    println!("{line}");
                }
            } else {
                for token in tokens {
                    println!("{token}");
                }
            }
        }
        CompletionResult::Empty => eprintln!("no completions"),
    }
}

fn emit_report(json: bool, report: &SuiteReport) -> Result<()> {
    if json {
        let payload = serde_json::to_string(report).into_diagnostic()?;
        println!("{payload}");
    } else {
        print_report(report);
    }
    match report.status {
        RunStatus::Passed => Ok(()),
        RunStatus::Failed => std::process::exit(EXIT_FAILED),
        RunStatus::Errored => std::process::exit(EXIT_ERRORED),
    }
}

fn print_report(report: &SuiteReport) {
    for test in &report.tests {
        println!("{} ({:?})", test.name, test.status);
        if let Some(err) = &test.error {
            println!("  error: {}: {}", err.code, err.message);
        }
        for probe in &test.probes {
            print!("  {:?} {:?}", probe.status, probe.input);
            if let Some(mismatch) = probe.outcome.as_ref().and_then(|o| o.mismatch()) {
                print!(": {mismatch}");
            }
            if let Some(err) = &probe.error {
                print!(": {}: {}", err.code, err.message);
            }
            println!();
        }
    }
    if let Some(err) = &report.error {
        println!("suite error: {}: {}", err.code, err.message);
    }
    println!(
        "{:?}: {} passed, {} failed, {} errored, {} skipped",
        report.status,
        report.count(tabprobe::ProbeStatus::Passed),
        report.count(tabprobe::ProbeStatus::Failed),
        report.count(tabprobe::ProbeStatus::Errored),
        report.count(tabprobe::ProbeStatus::Skipped),
    );
}

fn emit_error(json: bool, err: &HarnessError) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        eprintln!("error: {err}");
        if err.message.contains("open pty") {
            eprintln!(
                "warning: PTY support appears unavailable; this is common in minimal containers"
            );
        }
    }
    std::process::exit(exit_code_for_error(err));
}

fn exit_code_for_error(err: &HarnessError) -> i32 {
    err.code.exit_code()
}
