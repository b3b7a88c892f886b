//! `ir-tool`: reads textual IR, parses it, runs the checker, and reports
//! diagnostics (§6.1). Exit codes: `0` ok, `1` I/O failure, `2` parse
//! errors, `3` check errors.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use katara_cli::write_function_artifacts;
use katara_common::issues::{Format, IssueTracker};
use katara_common::position::FileSet;
use katara_ir_check::check_program;
use katara_ir_serialization::parser::parse_program;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ir-tool")]
#[command(about = "Parse and check textual Katara IR", long_about = None)]
struct Cli {
    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Suppresses all but error-level log output
    #[arg(short, long)]
    quiet: bool,
    /// Directory to write `.txt`/`.dot` debug artifacts into
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an IR file and check it for well-formedness
    Parse {
        /// Path to a `.ir` file
        path: PathBuf,
    },
}

// Exit code 1 (I/O failure) is produced by anyhow's default `main` error
// handling when `run_parse` returns `Err`, e.g. from a missing file.
const EXIT_OK: u8 = 0;
const EXIT_PARSE_ERRORS: u8 = 2;
const EXIT_CHECK_ERRORS: u8 = 3;

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.quiet {
        true => log::set_max_level(log::LevelFilter::Error),
        false => match cli.verbose {
            0 => log::set_max_level(log::LevelFilter::Info),
            1 => log::set_max_level(log::LevelFilter::Debug),
            _ => log::set_max_level(log::LevelFilter::Trace),
        },
    }

    let Commands::Parse { path } = cli.command;
    let code = run_parse(&path, cli.debug_dir.as_deref())?;
    Ok(ExitCode::from(code))
}

fn run_parse(path: &std::path::Path, debug_dir: Option<&std::path::Path>) -> Result<u8> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut file_set = FileSet::new();
    let file_index = file_set.add_file(path.display().to_string(), contents);

    let mut parse_issues = IssueTracker::new();
    let (program, positions) = parse_program(file_set.file(file_index), &mut parse_issues);

    if !parse_issues.is_empty() {
        let mut out = String::new();
        parse_issues.print(&file_set, Format::Terminal, &mut out).context("formatting parse diagnostics")?;
        eprint!("{out}");
    }
    if parse_issues.has_errors() {
        return Ok(EXIT_PARSE_ERRORS);
    }

    let mut check_issues = IssueTracker::new();
    check_program(&program, &positions, &mut check_issues);
    if !check_issues.is_empty() {
        let mut out = String::new();
        check_issues.print(&file_set, Format::Terminal, &mut out).context("formatting check diagnostics")?;
        eprint!("{out}");
    }

    if let Some(dir) = debug_dir {
        katara_cli::write_program_stage(dir, "init", &program).context("writing debug artifacts")?;
        write_function_artifacts(dir, &program, None, None).context("writing per-function debug artifacts")?;
    }

    if check_issues.has_errors() {
        return Ok(EXIT_CHECK_ERRORS);
    }
    Ok(EXIT_OK)
}
