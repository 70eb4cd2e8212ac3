#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use idp_harness::{run_churn, run_model_check, run_sparse};
use std::env;

const DEFAULT_SEED: u64 = 0x5eed_1d00_u64;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str);
    let rest = args.get(1..).unwrap_or_default();

    match cmd {
        Some("churn") => {
            let ops = flag_value(rest, "--ops")?.unwrap_or(100_000);
            let seed = flag_value(rest, "--seed")?.unwrap_or(DEFAULT_SEED);
            let report = run_churn(ops, seed)?;
            emit(&report, wants_json(rest), |r| {
                println!(
                    "churn: {} ops ({} alloc, {} free), len={} capacity={} expansions={}",
                    r.ops, r.allocated, r.removed, r.final_len, r.capacity, r.expansions
                );
            })
        }
        Some("sparse") => {
            let levels = flag_value(rest, "--levels")?.unwrap_or(12);
            if levels > 16 {
                bail!("--levels above 16 would build a multi-gigabyte table");
            }
            let seed = flag_value(rest, "--seed")?.unwrap_or(DEFAULT_SEED);
            let report = run_sparse(u32::try_from(levels).expect("bounded above"), seed)?;
            emit(&report, wants_json(rest), |r| {
                println!(
                    "sparse: {} targets, {} retries, capacity={} expansions={}",
                    r.targets.len(),
                    r.retries,
                    r.capacity,
                    r.expansions
                );
            })
        }
        Some("model") => {
            let steps = flag_value(rest, "--steps")?.unwrap_or(50_000);
            let seed = flag_value(rest, "--seed")?.unwrap_or(DEFAULT_SEED);
            let report = run_model_check(steps, seed)?;
            emit(&report, wants_json(rest), |r| {
                println!(
                    "model: {} steps verified, len={} capacity={}",
                    r.steps, r.final_len, r.capacity
                );
            })
        }
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

/// Parse `--name <u64>` out of the argument tail.
fn flag_value(args: &[String], name: &str) -> Result<Option<u64>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    let raw = args
        .get(pos + 1)
        .with_context(|| format!("{name} requires a value"))?;
    let value = raw
        .parse()
        .with_context(|| format!("invalid value for {name}: {raw}"))?;
    Ok(Some(value))
}

fn wants_json(args: &[String]) -> bool {
    args.iter().any(|a| a == "--json")
}

fn emit<R: serde::Serialize>(report: &R, json: bool, text: impl FnOnce(&R)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        text(report);
    }
    Ok(())
}

fn print_usage() {
    eprintln!("usage: idp-harness <command> [options]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  churn   [--ops N] [--seed N] [--json]    allocate/release churn");
    eprintln!("  sparse  [--levels N] [--seed N] [--json]  two-phase growth ladder");
    eprintln!("  model   [--steps N] [--seed N] [--json]   model-checked random ops");
}
