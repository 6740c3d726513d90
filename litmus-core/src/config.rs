//! Enumerator configuration (spec §6).

/// Whether finalization should skip final states that cannot affect the
/// test's outcome predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedCheck {
    #[default]
    Off,
    On,
    Fast,
}

/// Structured diagnostic flags, gating `tracing::debug!`/`trace!` call sites
/// in the solver-facing and RFMap-facing code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugFlags {
    pub solver: bool,
    pub rfm: bool,
}

/// All enumerator tuning knobs from spec §6, in one place.
#[derive(Debug, Clone)]
pub struct Config {
    /// Diagnostic verbosity. Higher values unlock more `tracing::trace!`
    /// call sites; this does not gate correctness, only logging.
    pub verbose: u32,
    /// Enables uniproc-based pruning in §4.4 and §4.5.
    pub optace: bool,
    /// Loop back-jump bound.
    pub unroll: u32,
    /// When not `Off`, §4.5 skips final states irrelevant to the test
    /// predicate.
    pub speedcheck: SpeedCheck,
    /// Restricts §4.5 final-store enumeration to observation-clause
    /// locations.
    pub observed_finals_only: bool,
    /// Models initial values as explicit init-write events rather than an
    /// implicit `Init` RF source.
    pub initwrites: bool,
    /// Whether to apply the test's optional filter predicate.
    pub check_filter: bool,
    pub debug: DebugFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: 0,
            optace: true,
            unroll: 2,
            speedcheck: SpeedCheck::Off,
            observed_finals_only: false,
            initwrites: false,
            check_filter: true,
            debug: DebugFlags::default(),
        }
    }
}
