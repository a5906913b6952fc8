use std::env;
use std::fmt::Write as _;

use tracing::{info, warn};

use crate::calc::{calculate_scenario, TeamCalculationResult};
use crate::config::{load_config, load_config_or_default, CalcConfig, DEFAULT_CONFIG_PATH};
use crate::data::card::{load_cards, Card};
use crate::data::error::DataError;
use crate::data::team::{load_scenario, Scenario};
use crate::data::validate::{validate_card_dataset, ValidationSeverity};
use crate::parallel::{calculate_many, WorkerPool};
use crate::server::{self, ServerState};

const USAGE: &str = "usage: teamcalc <calculate|batch|validate|serve>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Calculate,
    Batch,
    Validate,
    Serve,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("calculate") => Some(Command::Calculate),
        Some("batch") => Some(Command::Batch),
        Some("validate") => Some(Command::Validate),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Calculate) => handle_calculate(args),
        Some(Command::Batch) => handle_batch(args),
        Some(Command::Validate) => handle_validate(args),
        Some(Command::Serve) => handle_serve(),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

/// Positional arguments after the subcommand, skipping flags and their values.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(2);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "--workers" => {
                iter.next();
            }
            flag if flag.starts_with("--") => {}
            value => out.push(value),
        }
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn resolve_config(args: &[String]) -> Result<CalcConfig, DataError> {
    match flag_value(args, "--config") {
        Some(path) => load_config(path),
        None => load_config_or_default(DEFAULT_CONFIG_PATH),
    }
}

fn load_inputs(args: &[String], cards_path: &str) -> Result<(Vec<Card>, CalcConfig), DataError> {
    let cards = load_cards(cards_path)?;
    let config = resolve_config(args)?;
    info!(cards = cards.len(), path = cards_path, "card dataset loaded");
    Ok((cards, config))
}

fn handle_calculate(args: &[String]) -> i32 {
    let positional = positionals(args);
    let (Some(cards_path), Some(scenario_path)) = (positional.first(), positional.get(1)) else {
        eprintln!("usage: teamcalc calculate <cards.json> <scenario.json> [--table] [--config path]");
        return 2;
    };
    let as_table = args.iter().any(|arg| arg == "--table");

    let outcome = load_inputs(args, cards_path).and_then(|(cards, config)| {
        let scenario = load_scenario(scenario_path)?;
        calculate_scenario(&scenario, &cards, &config)
    });
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            eprintln!("calculation failed: {err}");
            return 1;
        }
    };

    if as_table {
        print!("{}", render_table(&result));
        return 0;
    }
    match serde_json::to_string_pretty(&result) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize calculation result: {err}");
            1
        }
    }
}

fn handle_batch(args: &[String]) -> i32 {
    let positional = positionals(args);
    let Some((cards_path, scenario_paths)) = positional.split_first() else {
        eprintln!("usage: teamcalc batch <cards.json> <scenario.json>... [--workers n] [--config path]");
        return 2;
    };
    if scenario_paths.is_empty() {
        eprintln!("usage: teamcalc batch <cards.json> <scenario.json>... [--workers n] [--config path]");
        return 2;
    }
    let workers = parse_usize_arg(flag_value(args, "--workers"), "workers", 0);

    let (cards, config) = match load_inputs(args, cards_path) {
        Ok(inputs) => inputs,
        Err(err) => {
            eprintln!("batch failed: {err}");
            return 1;
        }
    };
    let scenarios: Result<Vec<Scenario>, DataError> =
        scenario_paths.iter().map(load_scenario).collect();
    let scenarios = match scenarios {
        Ok(scenarios) => scenarios,
        Err(err) => {
            eprintln!("batch failed: {err}");
            return 1;
        }
    };

    let results = calculate_many(&scenarios, &cards, &config, &WorkerPool::with_workers(workers));
    let mut failures = 0;
    let entries: Vec<serde_json::Value> = scenario_paths
        .iter()
        .zip(results)
        .map(|(path, result)| match result {
            Ok(result) => serde_json::json!({ "scenario": path, "result": result }),
            Err(err) => {
                failures += 1;
                serde_json::json!({ "scenario": path, "error": err.to_string() })
            }
        })
        .collect();

    match serde_json::to_string_pretty(&entries) {
        Ok(payload) => println!("{payload}"),
        Err(err) => {
            eprintln!("failed to serialize batch results: {err}");
            return 1;
        }
    }
    if failures > 0 {
        eprintln!("{failures} scenario(s) failed");
        1
    } else {
        0
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(path) = positionals(args).first().copied() else {
        eprintln!("usage: teamcalc validate <cards.json>");
        return 2;
    };

    let report = match validate_card_dataset(path) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return 1;
        }
    };
    for diag in &report.diagnostics {
        eprintln!("[{}] {}: {}", diag.severity, diag.context, diag.message);
    }
    let errors = report.count(ValidationSeverity::Error);
    let warnings = report.count(ValidationSeverity::Warning);
    if errors > 0 {
        eprintln!("validation failed: {errors} error(s), {warnings} warning(s)");
        1
    } else {
        println!(
            "validation passed: {path} ({} cards, {warnings} warning(s))",
            report.cards_checked
        );
        0
    }
}

fn handle_serve() -> i32 {
    let bind_addr = env::var("TEAMCALC_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let cards = match env::var("TEAMCALC_CARDS") {
        Ok(path) => match load_cards(&path) {
            Ok(cards) => cards,
            Err(err) => {
                eprintln!("server error: {err}");
                return 1;
            }
        },
        Err(_) => {
            warn!("TEAMCALC_CARDS not set; requests must carry their own cards");
            Vec::new()
        }
    };
    let config = match load_config_or_default(DEFAULT_CONFIG_PATH) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("server error: {err}");
            return 1;
        }
    };

    match server::run_server(&bind_addr, ServerState { cards, config }) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

/// Tab-separated summary: one row per populated slot, then team totals.
pub fn render_table(result: &TeamCalculationResult) -> String {
    let mut out = String::from("slot\tcard\tlevel\tatk\tcrit_rate\tnormal\tskill\tdps\n");
    for member in &result.members {
        let Some(card_id) = member.card_id.as_deref() else {
            continue;
        };
        let (normal, skill, dps) = member
            .damage
            .map(|damage| (damage.normal.expected, damage.skill.expected, damage.dps))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}\t{}\t{:.0}\t{:.0}\t{:.4}\t{:.0}\t{:.0}\t{:.2}",
            member.slot,
            card_id,
            member.stats.level,
            member.stats.atk,
            member.stats.crit_rate,
            normal,
            skill,
            dps
        );
    }
    let _ = writeln!(
        out,
        "total\t\t\t\t\t\t{:.0}\t{:.2}",
        result.totals.total_skill_damage, result.totals.total_dps
    );
    out
}

fn parse_usize_arg(raw: Option<&str>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn positionals_skip_flags_and_their_values() {
        let argv = args(&["teamcalc", "batch", "cards.json", "--workers", "4", "a.json", "--table", "b.json"]);
        assert_eq!(positionals(&argv), vec!["cards.json", "a.json", "b.json"]);
        assert_eq!(flag_value(&argv, "--workers"), Some("4"));
        assert_eq!(flag_value(&argv, "--config"), None);
    }

    #[test]
    fn parse_command_matches_subcommands() {
        assert_eq!(parse_command(&args(&["teamcalc", "calculate"])), Some(Command::Calculate));
        assert_eq!(parse_command(&args(&["teamcalc", "serve"])), Some(Command::Serve));
        assert_eq!(parse_command(&args(&["teamcalc", "simulate"])), None);
        assert_eq!(parse_command(&args(&["teamcalc"])), None);
    }
}
