//! Collaborator operations
//!
//! Groups, events, polls and invites. Every writer here keeps the invariants
//! the lifecycle engine relies on: responses only from members of the event's
//! group, and a chosen option that always belongs to its event.

pub mod event;
pub mod group;
pub mod invite;
pub mod vote;

pub use event::{EventChanges, EventDetail, NewEvent, NewOption, OptionDetail};
pub use vote::{OptionSelections, ToggleOutcome};
