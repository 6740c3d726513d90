//! Command-line surface, grounded in `simulator/runner/cli.rs`'s
//! `SimulatorCLI`: a flat `clap`-derived struct with one flag per tuning
//! knob, plus a `validate` pass that turns nonsensical input into an
//! `anyhow` error before anything runs.

use anyhow::bail;
use clap::{command, Parser, ValueEnum};
use litmus_core::config::{Config, DebugFlags, SpeedCheck};

#[derive(Parser, Debug, Clone)]
#[command(name = "litmus-cli")]
#[command(author, version, about, long_about = None)]
pub struct LitmusCli {
    /// Path to the litmus test file to run.
    pub test: std::path::PathBuf,

    #[clap(short, long, help = "diagnostic verbosity (0 = quiet)", default_value_t = 0)]
    pub verbose: u32,

    #[clap(long, help = "disable uniproc-based pruning", default_value_t = false)]
    pub no_optace: bool,

    #[clap(long, help = "loop back-jump bound", default_value_t = 2)]
    pub unroll: u32,

    #[clap(long, value_enum, help = "skip final states irrelevant to the observation clause", default_value_t = SpeedCheckArg::Off)]
    pub speedcheck: SpeedCheckArg,

    #[clap(long, help = "restrict final-store enumeration to observed locations", default_value_t = false)]
    pub observed_finals_only: bool,

    #[clap(long, help = "model initial values as explicit init-write events", default_value_t = false)]
    pub initwrites: bool,

    #[clap(long, help = "skip the test's filter predicate, if any", default_value_t = false)]
    pub no_filter: bool,

    #[clap(long, help = "trace solver decisions", default_value_t = false)]
    pub debug_solver: bool,

    #[clap(long, help = "trace reads-from map construction", default_value_t = false)]
    pub debug_rfm: bool,

    #[clap(long, help = "emit each concrete execution as one JSON line instead of text", default_value_t = false)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedCheckArg {
    Off,
    On,
    Fast,
}

impl From<SpeedCheckArg> for SpeedCheck {
    fn from(value: SpeedCheckArg) -> Self {
        match value {
            SpeedCheckArg::Off => SpeedCheck::Off,
            SpeedCheckArg::On => SpeedCheck::On,
            SpeedCheckArg::Fast => SpeedCheck::Fast,
        }
    }
}

impl LitmusCli {
    /// Reject contradictory input before anything runs (mirrors
    /// `SimulatorCLI::validate`'s `anyhow::bail!` style).
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.test.exists() {
            bail!("test file `{}` does not exist", self.test.display());
        }
        if self.unroll == 0 {
            bail!("--unroll must be at least 1: a bound of 0 would reject every loop immediately");
        }
        Ok(())
    }

    pub fn to_config(&self) -> Config {
        Config {
            verbose: self.verbose,
            optace: !self.no_optace,
            unroll: self.unroll,
            speedcheck: self.speedcheck.into(),
            observed_finals_only: self.observed_finals_only,
            initwrites: self.initwrites,
            check_filter: !self.no_filter,
            debug: DebugFlags {
                solver: self.debug_solver,
                rfm: self.debug_rfm,
            },
        }
    }
}
