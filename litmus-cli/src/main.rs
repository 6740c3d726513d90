//! Thin driver binary: parse a litmus file and the tuning knobs, run the
//! enumerator, print every delivered concrete execution. Grounded in
//! `simulator/runner/cli.rs`'s `SimulatorCLI` for the flag surface and
//! `validate()` discipline; `litmus-core` itself stays free of I/O.

mod cli;
mod litmus_file;

use std::fs;

use clap::Parser;
use litmus_core::constraint::{RfKey, RfValue};
use litmus_core::finalize::{ConcreteExecution, FinalizationSpec};
use litmus_core::isa::ToySemantics;
use litmus_core::solver::UnionFindSolver;
use litmus_core::{calculate_rf_with_cnstrnts, glommed_event_structures, relabel};

use cli::LitmusCli;

fn main() -> anyhow::Result<()> {
    let args = LitmusCli::parse();
    args.validate()?;
    init_tracing(args.verbose);

    let text = fs::read_to_string(&args.test)
        .map_err(|e| anyhow::anyhow!("reading `{}`: {e}", args.test.display()))?;
    let parsed = litmus_file::parse(&text)?;
    let config = args.to_config();
    let semantics = ToySemantics::new(parsed.observed.clone());
    let init = parsed.init;

    let result = glommed_event_structures(&parsed.program, &semantics, &parsed.starts, &config, &init)?;
    tracing::info!(
        candidates = result.structures.len(),
        too_far = result.too_far,
        "instruction driver finished"
    );

    let solver = UnionFindSolver::new();
    let fspec = FinalizationSpec {
        observed_locations: &parsed.observed,
        filter: None,
    };

    let mut delivered = 0usize;
    let mut loop_exceeded = result.too_far;
    for (index, constraints, structure) in result.structures {
        let structure = relabel(&structure);
        let count = calculate_rf_with_cnstrnts(
            &structure,
            constraints,
            &init,
            &config,
            &semantics,
            &solver,
            &fspec,
            |concrete, count| {
                print_concrete(index, &concrete, args.json);
                count + 1
            },
            |count| {
                loop_exceeded = true;
                count
            },
            0usize,
        );
        delivered += count;
    }

    if loop_exceeded {
        tracing::warn!("at least one candidate was abandoned past the unroll bound");
    }
    println!("{delivered} concrete execution(s) delivered");
    Ok(())
}

fn init_tracing(verbose: u32) {
    use tracing_subscriber::EnvFilter;
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn print_concrete(candidate_index: usize, concrete: &ConcreteExecution, as_json: bool) {
    if as_json {
        let finals: Vec<(i64, i64)> = concrete.final_state.iter().collect();
        let line = serde_json::json!({
            "candidate": candidate_index,
            "final_state": finals,
        });
        println!("{line}");
        return;
    }

    println!("candidate {candidate_index}:");
    for (address, value) in concrete.final_state.iter() {
        println!("  x{address} = {value}");
    }
    for load in concrete.structure.memory_loads() {
        let from = match concrete.rfmap.get(&RfKey::Load(load.id)) {
            Some(RfValue::Init) | None => "init".to_string(),
            Some(RfValue::Store(store)) => format!("event {}", store.0),
        };
        println!("  load at thread {:?}, po {} reads from {from}", load.thread, load.po_index);
    }
}
