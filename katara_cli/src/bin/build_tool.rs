//! `build-tool`: reads surface-language source, translates it to IR via an
//! injectable [`SurfaceTranslator`], optionally optimizes, lowers, optionally
//! optimizes again, and writes debug artifacts (§6.1). Exit codes: `0` ok,
//! `1` load failure, `2` no main package, `3` translation to IR failed.

use anyhow::{Context, Result};
use clap::Parser;
use katara_cli::{write_function_artifacts, write_program_stage, StubSurfaceTranslator, SurfaceTranslator, TranslationError};
use katara_common::issues::IssueTracker;
use katara_ir_check::check_program;
use katara_ir_lowering::{
    convert_shared_to_unique_pointers_in_program, lower_shared_pointers_in_program,
    lower_unique_pointers_in_program, promote_unique_pointers_to_locals_in_program,
    remove_unused_functions,
};
use katara_ir_serialization::positions::ProgramPositions;
use std::path::PathBuf;
use std::process::ExitCode;

/// Seen Programming Language's Katara IR build tool.
///
/// Ships with a stub surface-language translator that always reports
/// `translation-to-ir-failed`; its exit-code contract is observable without
/// a real surface-language front end wired in.
#[derive(Parser)]
#[command(name = "build-tool")]
struct Cli {
    /// Source paths making up the package to build
    paths: Vec<PathBuf>,
    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Skips the shared-to-unique and unique-to-local optimizers
    #[arg(long)]
    no_optimize: bool,
    /// Skips the unused-function cleanup pass after lowering
    #[arg(long)]
    no_cleanup: bool,
    /// Writes `.txt`/`.dot` debug artifacts at every pipeline stage
    #[arg(long)]
    debug: bool,
    /// Directory to write debug artifacts into (implies `--debug`)
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

const EXIT_OK: u8 = 0;
const EXIT_LOAD_FAILED: u8 = 1;
const EXIT_NO_MAIN_PACKAGE: u8 = 2;
const EXIT_TRANSLATION_FAILED: u8 = 3;

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.verbose {
        0 => log::set_max_level(log::LevelFilter::Info),
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    for path in &cli.paths {
        if !path.exists() {
            log::error!("no such path: {}", path.display());
            return Ok(ExitCode::from(EXIT_LOAD_FAILED));
        }
    }

    let debug_dir = cli.debug_dir.clone().or_else(|| cli.debug.then(|| PathBuf::from("katara-debug")));
    let code = run_build(&cli.paths, !cli.no_optimize, !cli.no_cleanup, debug_dir.as_deref())?;
    Ok(ExitCode::from(code))
}

fn run_build(paths: &[PathBuf], optimize: bool, cleanup: bool, debug_dir: Option<&std::path::Path>) -> Result<u8> {
    let translator = StubSurfaceTranslator;
    let mut program = match translator.translate(paths) {
        Ok(program) => program,
        Err(TranslationError::NoMainPackage) => {
            log::error!("no main package found among the given paths");
            return Ok(EXIT_NO_MAIN_PACKAGE);
        }
        Err(TranslationError::Failed(message)) => {
            log::error!("{message}");
            return Ok(EXIT_TRANSLATION_FAILED);
        }
    };

    let positions = ProgramPositions::new();
    if let Some(dir) = debug_dir {
        write_program_stage(dir, "init", &program).context("writing ir.init.txt")?;
    }

    if optimize {
        convert_shared_to_unique_pointers_in_program(&mut program);
        promote_unique_pointers_to_locals_in_program(&mut program);
    }
    let mut post_optimize_issues = IssueTracker::new();
    check_program(&program, &positions, &mut post_optimize_issues);
    log_issues(&post_optimize_issues, "post-optimize check");
    if let Some(dir) = debug_dir {
        write_program_stage(dir, "ext_optimized", &program).context("writing ir.ext_optimized.txt")?;
    }

    lower_shared_pointers_in_program(&mut program);
    lower_unique_pointers_in_program(&mut program);
    let mut post_lower_issues = IssueTracker::new();
    check_program(&program, &positions, &mut post_lower_issues);
    log_issues(&post_lower_issues, "post-lowering check");
    if let Some(dir) = debug_dir {
        write_program_stage(dir, "lowered", &program).context("writing ir.lowered.txt")?;
    }

    if cleanup {
        remove_unused_functions(&mut program);
    }
    if let Some(dir) = debug_dir {
        write_program_stage(dir, "optimized", &program).context("writing ir.optimized.txt")?;
        write_function_artifacts(dir, &program, None, None).context("writing per-function debug artifacts")?;
    }

    Ok(EXIT_OK)
}

fn log_issues(issues: &IssueTracker<katara_ir_check::CheckerIssueKind>, stage: &str) {
    if issues.is_empty() {
        return;
    }
    let file_set = katara_common::position::FileSet::new();
    let mut out = String::new();
    if issues.print(&file_set, katara_common::issues::Format::Plain, &mut out).is_ok() {
        log::warn!("{stage} reported issues:\n{out}");
    }
}
