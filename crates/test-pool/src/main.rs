//! CLI entry point for the TBSA-v8M simulated-target runner.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use env_logger::Env;
use log::LevelFilter;
use test_pool::{load_target, registry, run_to_completion, RunSummary};
use thiserror as _;
use val_core::{SimTarget, TargetConfig};
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

const DEFAULT_MAX_BOOTS: u32 = 8;

const USAGE_TEXT: &str = "\
Usage: tbsa-sim <command> [options]

Commands:
  list                                   List registered tests
  run [--target <file>] [--max-boots N]  Run every test on a simulated target
  dump-target                            Print the reference target as JSON

Options:
  -t, --target <file>  JSON target description (default: reference target)
  -b, --max-boots <N>  Boots allowed for tests that provoke a reset (default: 8)
  -v, --verbose        Log lifecycle and checkpoint detail to stderr
  -h, --help           Show this help message

Examples:
  tbsa-sim list
  tbsa-sim dump-target > target.json
  tbsa-sim run --target target.json -v
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    Run(RunArgs),
    DumpTarget,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    target: Option<PathBuf>,
    max_boots: u32,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "list" => expect_no_args(args)
            .map(|()| Command::List)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "dump-target" => expect_no_args(args)
            .map(|()| Command::DumpTarget)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn expect_no_args(mut args: impl Iterator<Item = OsString>) -> Result<(), String> {
    match args.next() {
        None => Ok(()),
        Some(arg) if arg == "--help" || arg == "-h" => Err(USAGE_TEXT.to_string()),
        Some(arg) => Err(format!("unexpected argument: {}", arg.to_string_lossy())),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut target: Option<PathBuf> = None;
    let mut max_boots = DEFAULT_MAX_BOOTS;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-t" || arg == "--target" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --target".to_string())?;
            target = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-b" || arg == "--max-boots" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --max-boots".to_string())?;
            let value = value.to_string_lossy();
            max_boots = value
                .parse::<u32>()
                .ok()
                .filter(|boots| *boots > 0)
                .ok_or_else(|| format!("invalid boot limit: {value}"))?;
            continue;
        }

        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }

    Ok(RunArgs {
        target,
        max_boots,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()))
        .try_init();
}

fn run_list() -> Result<(), i32> {
    let registry = registry().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    for test in registry.iter() {
        println!("{}  {}  [{}]", test.id(), test.title(), test.ref_tag());
    }
    Ok(())
}

fn run_dump_target() -> Result<(), i32> {
    match serde_json::to_string_pretty(&TargetConfig::default()) {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to serialize target: {e}");
            Err(1)
        }
    }
}

fn run_tests(args: &RunArgs) -> Result<(), i32> {
    init_logging(args.verbose);

    let config = match &args.target {
        Some(path) => load_target(path).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?,
        None => TargetConfig::default(),
    };
    let registry = registry().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let mut target = SimTarget::new(&config).map_err(|e| {
        eprintln!("error: invalid target description: {e}");
        1
    })?;

    let summary = run_to_completion(&registry, &mut target, &config, args.max_boots).map_err(
        |e| {
            eprintln!("error: {e}");
            1
        },
    )?;
    print_summary(&summary);

    if summary.is_clean() {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_summary(summary: &RunSummary) {
    for report in summary.verdicts() {
        if report.awaiting_reset() {
            println!(
                "{}  AWAITING RESET (checkpoint {})  {}",
                report.id, report.last_checkpoint, report.title
            );
        } else {
            println!("{}  {}  {}", report.id, report.result, report.title);
        }
    }
    println!();
    println!("Test Summary: {summary}");
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::List => run_list(),
                Command::Run(args) => run_tests(&args),
                Command::DumpTarget => run_dump_target(),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_run_command_with_options() {
        let result = parse_run_args(args(&["--target", "board.json", "-b", "3", "-v"]))
            .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                target: Some(PathBuf::from("board.json")),
                max_boots: 3,
                verbose: true,
            }
        );
    }

    #[test]
    fn run_defaults_to_reference_target() {
        let result = parse_run_args(std::iter::empty()).expect("bare run should parse");
        assert_eq!(result.target, None);
        assert_eq!(result.max_boots, DEFAULT_MAX_BOOTS);
        assert!(!result.verbose);
    }

    #[test]
    fn parses_list_and_dump_target() {
        assert!(matches!(
            parse_args(args(&["list"])),
            Ok(ParseResult::Command(Command::List))
        ));
        assert!(matches!(
            parse_args(args(&["dump-target"])),
            Ok(ParseResult::Command(Command::DumpTarget))
        ));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["flash"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_zero_or_malformed_boot_limit() {
        for value in ["0", "many", "-1"] {
            let error = parse_run_args(args(&["--max-boots", value]))
                .expect_err("bad boot limit should fail");
            assert!(error.contains("invalid boot limit"));
        }
    }

    #[test]
    fn rejects_trailing_arguments() {
        let error = parse_args(args(&["list", "extra"])).expect_err("list takes no arguments");
        assert!(error.contains("unexpected argument"));

        let error = parse_run_args(args(&["board.json"])).expect_err("target needs a flag");
        assert!(error.contains("unknown option"));
    }
}
