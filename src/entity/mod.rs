//! Entity module - sea-orm entity definitions
//!
//! One module per table

pub mod event;
pub mod event_option;
pub mod event_option_response;
pub mod group;
pub mod invite;
pub mod user;
pub mod user_and_group;
pub mod vote;
pub mod vote_option;
pub mod vote_option_response;

pub use event::EventState;
pub use event_option_response::ResponseKind;
