//! Event lifecycle engine
//!
//! Tallies responses, derives voting deadlines and sweeps events through
//! VOTING -> OPEN -> ACTIVE -> CLOSED.

mod deadline;
mod registry;
mod sweep;
mod tally;

pub use deadline::{compute_deadline, deadline_for_event, event_deadline, DERIVED_DEADLINE_HOUR};
pub use registry::submit_response;
pub use sweep::{
    plan_transition, resolve_lifecycle, voting_due, OptionWindow, Phase, Plan, SweepReport, Transition,
};
pub use tally::{compute_tally, select_option, OptionCount, Tally};
