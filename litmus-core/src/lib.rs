//! Concrete execution enumerator for weak-memory-model litmus tests.
//!
//! Given a parsed program (one code block per thread, an initial state, and
//! a set of start points) plus two pluggable collaborators — an
//! [`semantics::InstructionSemantics`] implementation for whatever
//! instruction set the caller parses, and a [`semantics::ConstraintSolver`]
//! — this crate walks every thread symbolically, enumerates every reads-from
//! assignment consistent with program order and (optionally) the uniproc
//! axiom, and delivers the resulting [`finalize::ConcreteExecution`] values
//! one at a time through a caller-supplied fold.
//!
//! The two external entry points are [`driver::glommed_event_structures`]
//! (drive every thread to an abstract `(constraints, event-structure)` list)
//! and [`enumerate::calculate_rf_with_cnstrnts`] (expand one such abstract
//! candidate into every concrete execution it can resolve to). A full run
//! composes them: call the driver once per test, then fold
//! `calculate_rf_with_cnstrnts` over each of its `structures`, relabelling
//! with [`relabel::relabel`] first so memory events occupy the contiguous
//! prefix the rest of the pipeline assumes.
//!
//! [`isa`] supplies a small default instruction set so the crate is runnable
//! without a caller bringing their own; [`solver::UnionFindSolver`] is the
//! default constraint solver.

pub mod config;
pub mod constraint;
pub mod cycle;
pub mod driver;
pub mod enumerate;
pub mod error;
pub mod event;
pub mod finalize;
pub mod isa;
pub mod location;
pub mod mem_rf;
pub mod monad;
pub mod reg_rf;
pub mod relabel;
pub mod semantics;
pub mod solver;
pub mod value;

pub use config::Config;
pub use constraint::{Constraint, InitialState, RfMap};
pub use driver::{glommed_event_structures, CodeBlock, DriverResult, Program, StartPoint};
pub use enumerate::calculate_rf_with_cnstrnts;
pub use error::{LitmusError, Result};
pub use event::EventStructure;
pub use finalize::{ConcreteExecution, FinalState, FinalizationSpec};
pub use relabel::relabel;
pub use semantics::{ConstraintSolver, InstructionSemantics};
pub use solver::UnionFindSolver;
