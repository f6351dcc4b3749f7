//! L2I Planner
//!
//! Merges capability-adjusted specs into one conflict-free, multi-domain
//! plan and resolves it into a backend-neutral intermediate representation
//! with concrete queue indices, meter instances and replica lists.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compose;
pub mod ir;
pub mod synth;

pub use compose::{ComposedPlan, Composer, DomainPlan, Sourced};
pub use ir::{
    CommitMode, DomainAction, FlowMatch, IrPlan, MeterAction, MeterInstance, MulticastAction,
    QueueAction, Replica, Replication, Scheduling,
};
pub use synth::Synthesizer;
