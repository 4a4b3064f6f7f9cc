//! omatch CLI: driving adapter for the omatch pattern matcher.
//!
//! Subcommands:
//! - `eval <pattern> <subject> [--verbose]` matches a subject and prints the bindings
//! - `trace <pattern> <subject>` prints every path step of one match
//! - `resolve <subject> <pattern>... [--allow-ambiguous]` picks the matching pattern
//! - `check <pattern>` validates that a pattern config builds
//!
//! Pattern configs are YAML or JSON (chosen by extension). Subjects are JSON.
//! Notices go to stderr through `tracing`; `RUST_LOG` overrides the level.

use std::process;

use omatch::{MatchResult, MultiPattern, Pattern, PatternConfig, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let (rest, flags) = split_flags(&args[2..]);
    init_tracing(flags.verbose);

    let result = match args[1].as_str() {
        "eval" => cmd_eval(&rest, &flags),
        "trace" => cmd_trace(&rest),
        "resolve" => cmd_resolve(&rest, &flags),
        "check" => cmd_check(&rest),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .try_init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_eval(args: &[String], flags: &Flags) -> Result<(), String> {
    let [pattern_path, subject_path] = args else {
        return Err("eval requires a pattern file and a subject file".into());
    };

    let mut pattern = load_pattern(pattern_path)?;
    if flags.verbose {
        pattern = pattern.with_verbose(true);
    }
    let subject = load_subject(subject_path)?;

    match pattern.matches(&subject) {
        Some(m) => println!("{}", render_bindings(&m)?),
        None => println!("(no match)"),
    }
    Ok(())
}

fn cmd_trace(args: &[String]) -> Result<(), String> {
    let [pattern_path, subject_path] = args else {
        return Err("trace requires a pattern file and a subject file".into());
    };

    let pattern = load_pattern(pattern_path)?;
    let subject = load_subject(subject_path)?;
    let trace = pattern.match_with_trace(&subject);

    for step in &trace.paths {
        let value = step
            .value
            .as_ref()
            .map_or_else(|| "<unresolved>".to_owned(), |v| format!("{v:?}"));
        println!(
            "{} = {value}  (evaluated {}, cached {})",
            step.path, step.evaluated, step.cached
        );
        for check in &step.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            println!("  {mark:>4} {}", check.predicate);
        }
        for name in &step.bound {
            println!("  bind {name}");
        }
    }

    match (&trace.result, &trace.failure) {
        (Some(m), _) => println!("{}", render_bindings(m)?),
        (None, Some(failure)) => println!("(no match: {failure})"),
        (None, None) => println!("(no match)"),
    }
    Ok(())
}

fn cmd_resolve(args: &[String], flags: &Flags) -> Result<(), String> {
    let Some((subject_path, pattern_paths)) = args.split_first() else {
        return Err("resolve requires a subject file and at least one pattern file".into());
    };
    if pattern_paths.is_empty() {
        return Err("resolve requires at least one pattern file".into());
    }

    let subject = load_subject(subject_path)?;
    let patterns = pattern_paths
        .iter()
        .map(|path| load_pattern(path))
        .collect::<Result<Vec<_>, _>>()?;
    let multi = MultiPattern::new(patterns).allow_ambiguous(flags.allow_ambiguous);

    let m = multi.resolve(&subject).map_err(|e| e.to_string())?;
    let index = multi
        .patterns()
        .iter()
        .position(|p| p.ptr_eq(m.pattern()))
        .unwrap_or_default();
    println!("{}", pattern_paths[index]);
    println!("{}", render_bindings(&m)?);
    Ok(())
}

fn cmd_check(args: &[String]) -> Result<(), String> {
    let [pattern_path] = args else {
        return Err("check requires a pattern file".into());
    };

    let pattern = load_pattern(pattern_path)?;
    println!("Pattern valid ({} paths)", pattern.len());
    Ok(())
}

fn render_bindings(m: &MatchResult) -> Result<String, String> {
    let json = Value::from(m.bound().clone()).to_json();
    serde_json::to_string_pretty(&json).map_err(|e| format!("cannot render bindings: {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(path: &str) -> Result<PatternConfig, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;

    let is_json = std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|e| format!("JSON parse error: {e}"))
    } else {
        // Default to YAML (handles .yaml and .yml)
        serde_yaml::from_str(&content).map_err(|e| format!("YAML parse error: {e}"))
    }
}

fn load_pattern(path: &str) -> Result<Pattern, String> {
    let config = load_config(path)?;
    let pattern = config
        .build()
        .map_err(|e| format!("pattern \"{path}\" invalid: {e}"))?;
    tracing::debug!(path, rules = pattern.len(), "pattern loaded");
    Ok(pattern)
}

fn load_subject(path: &str) -> Result<Value, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;
    let json: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| format!("JSON parse error: {e}"))?;
    Ok(Value::from(json))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, PartialEq)]
struct Flags {
    verbose: bool,
    allow_ambiguous: bool,
}

/// Separate `--flag` switches from positional arguments.
fn split_flags(args: &[String]) -> (Vec<String>, Flags) {
    let mut flags = Flags::default();
    let mut rest = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--verbose" | "-v" => flags.verbose = true,
            "--allow-ambiguous" => flags.allow_ambiguous = true,
            _ => rest.push(arg.clone()),
        }
    }
    (rest, flags)
}

fn print_usage() {
    eprintln!(
        "Usage: omatch <command> [options]

Commands:
  eval <pattern> <subject> [--verbose]                Match and print bindings
  trace <pattern> <subject>                           Show each path step
  resolve <subject> <pattern>... [--allow-ambiguous]  Pick the matching pattern
  check <pattern>                                     Validate a pattern config
  help                                                Show this help

Patterns are YAML or JSON; subjects are JSON. RUST_LOG sets the log filter."
    );
}
