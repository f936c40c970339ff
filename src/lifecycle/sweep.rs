//! Lifecycle state machine
//!
//! The sweep moves every resolvable event forward in one transaction, with a
//! single `now` for the whole pass:
//!
//! - VOTING events whose deadline passed get their winning option and go OPEN.
//! - OPEN/ACTIVE events go ACTIVE while their chosen option is in progress and
//!   CLOSED once it has ended.
//!
//! Each event write is guarded by its previously read state, so a concurrent
//! sweep that already moved the row turns the second write into a no-op.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::deadline::event_deadline;
use super::tally::{responses_by_option, Tally};
use crate::entity::{event, event_option, EventState};
use crate::error::{AppError, AppResult};

/// Where `now` falls relative to an option's time slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Upcoming,
    Ongoing,
    Ended,
}

/// Concrete time slot of an option, `start` inclusive and `end` exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptionWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OptionWindow {
    pub fn of(option: &event_option::Model) -> Self {
        let start = option.date.and_time(option.start_time);
        let end = match option.end_time {
            Some(end_time) if end_time > option.start_time => option.date.and_time(end_time),
            // Ends at or before it starts: runs past midnight
            Some(end_time) => next_day(option.date).and_time(end_time),
            None => next_day(option.date).and_time(NaiveTime::MIN),
        };
        Self { start, end }
    }

    /// The end check wins, so an event is never both ongoing and ended.
    pub fn phase(&self, now: NaiveDateTime) -> Phase {
        if now >= self.end {
            Phase::Ended
        } else if now >= self.start {
            Phase::Ongoing
        } else {
            Phase::Upcoming
        }
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// Target state of one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    pub state: EventState,
    pub chosen_option_id: Option<i32>,
}

/// A state change performed by a sweep
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub event_id: i32,
    pub group_id: i32,
    pub from: EventState,
    pub to: EventState,
    pub chosen_option_id: Option<i32>,
}

/// Result of one sweep
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub now: NaiveDateTime,
    pub transitions: Vec<Transition>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Whether a VOTING event is ready to pick its option
pub fn voting_due(event: &event::Model, options: &[event_option::Model], now: NaiveDateTime) -> bool {
    if event.state != EventState::Voting || event.chosen_option_id.is_some() || options.is_empty() {
        return false;
    }
    matches!(event_deadline(event, options), Some(deadline) if deadline <= now)
}

/// Decide where `event` belongs at `now`. `None` means nothing to write.
///
/// `tally` is only consulted when [`voting_due`] holds; without it a due event
/// stays in VOTING.
pub fn plan_transition(
    event: &event::Model,
    options: &[event_option::Model],
    tally: Option<&Tally>,
    now: NaiveDateTime,
) -> Option<Plan> {
    let mut state = event.state;
    let mut chosen_option_id = event.chosen_option_id;

    if voting_due(event, options, now) {
        if let Some(picked) = tally.and_then(|tally| tally.chosen_option_id) {
            state = EventState::Open;
            chosen_option_id = Some(picked);
        }
    }

    if matches!(state, EventState::Open | EventState::Active) {
        let chosen = chosen_option_id.and_then(|id| options.iter().find(|option| option.id == id));
        match chosen {
            Some(option) => match OptionWindow::of(option).phase(now) {
                Phase::Ended => state = EventState::Closed,
                Phase::Ongoing => state = EventState::Active,
                Phase::Upcoming => {}
            },
            None if chosen_option_id.is_some() => {
                error!(
                    "Event {} points at option {:?} which it does not own",
                    event.id, chosen_option_id
                );
            }
            None => {}
        }
    }

    debug_assert!(state >= event.state, "lifecycle must not regress");

    if state == event.state && chosen_option_id == event.chosen_option_id {
        None
    } else {
        Some(Plan {
            state,
            chosen_option_id,
        })
    }
}

/// Run one sweep over all events in a single transaction.
pub async fn resolve_lifecycle(db: &DatabaseConnection, now: NaiveDateTime) -> AppResult<SweepReport> {
    let report = db
        .transaction::<_, SweepReport, AppError>(|txn| Box::pin(async move { sweep(txn, now).await }))
        .await?;

    if report.is_empty() {
        debug!("Lifecycle sweep at {}: nothing to do", now);
    } else {
        info!(
            "Lifecycle sweep at {}: {} event(s) transitioned",
            now,
            report.transitions.len()
        );
    }
    Ok(report)
}

async fn sweep<C: ConnectionTrait>(conn: &C, now: NaiveDateTime) -> AppResult<SweepReport> {
    let events = event::Entity::find()
        .filter(event::Column::State.is_in(EventState::RESOLVABLE))
        .order_by_asc(event::Column::Id)
        .all(conn)
        .await?;

    if events.is_empty() {
        return Ok(SweepReport {
            now,
            transitions: Vec::new(),
        });
    }

    // Select the events again server side; the resolvable set is unbounded
    let resolvable_events = Query::select()
        .column(event::Column::Id)
        .from(event::Entity)
        .and_where(event::Column::State.is_in(EventState::RESOLVABLE))
        .to_owned();
    let mut options_by_event: HashMap<i32, Vec<event_option::Model>> = HashMap::new();
    for option in event_option::Entity::find()
        .filter(event_option::Column::EventId.in_subquery(resolvable_events))
        .order_by_asc(event_option::Column::Id)
        .all(conn)
        .await?
    {
        options_by_event.entry(option.event_id).or_default().push(option);
    }

    // Responses only matter for events whose voting closes in this pass
    let due_option_ids: Vec<i32> = events
        .iter()
        .filter(|event| voting_due(event, options_for(&options_by_event, event.id), now))
        .flat_map(|event| options_for(&options_by_event, event.id).iter().map(|option| option.id))
        .collect();
    let responses = responses_by_option(conn, &due_option_ids).await?;

    let mut transitions = Vec::new();
    for event in &events {
        let options = options_for(&options_by_event, event.id);

        let tally = voting_due(event, options, now).then(|| {
            Tally::from_responses(
                options.iter().map(|option| option.id),
                options.iter().flat_map(|option| {
                    responses
                        .get(&option.id)
                        .into_iter()
                        .flatten()
                        .map(move |kind| (option.id, *kind))
                }),
            )
        });

        let Some(plan) = plan_transition(event, options, tally.as_ref(), now) else {
            continue;
        };

        if apply_plan(conn, event, plan).await? {
            info!(
                "Event {} moved {:?} -> {:?} (chosen option {:?})",
                event.id, event.state, plan.state, plan.chosen_option_id
            );
            transitions.push(Transition {
                event_id: event.id,
                group_id: event.group_id,
                from: event.state,
                to: plan.state,
                chosen_option_id: plan.chosen_option_id,
            });
        }
    }

    Ok(SweepReport { now, transitions })
}

fn options_for(
    options_by_event: &HashMap<i32, Vec<event_option::Model>>,
    event_id: i32,
) -> &[event_option::Model] {
    options_by_event
        .get(&event_id)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Write `plan` only if the row still holds the state it was planned from
/// and a newly chosen option still exists.
pub(crate) async fn apply_plan<C: ConnectionTrait>(
    conn: &C,
    event: &event::Model,
    plan: Plan,
) -> AppResult<bool> {
    let newly_chosen = plan
        .chosen_option_id
        .filter(|_| plan.chosen_option_id != event.chosen_option_id);
    if let Some(chosen) = newly_chosen {
        // Shared lock holds off `delete_option` until this transaction ends
        let owned = event_option::Entity::find_by_id(chosen)
            .filter(event_option::Column::EventId.eq(event.id))
            .lock_shared()
            .one(conn)
            .await?;
        if owned.is_none() {
            warn!(
                "Option {} of event {} is gone, skipping move to {:?}",
                chosen, event.id, plan.state
            );
            return Ok(false);
        }
    }

    let mut update = event::Entity::update_many()
        .col_expr(event::Column::State, Expr::value(plan.state))
        .filter(event::Column::Id.eq(event.id))
        .filter(event::Column::State.eq(event.state));

    if plan.chosen_option_id != event.chosen_option_id {
        update = update
            .col_expr(event::Column::ChosenOptionId, Expr::value(plan.chosen_option_id))
            .filter(event::Column::ChosenOptionId.is_null());
    }

    let result = update.exec(conn).await?;
    if result.rows_affected == 0 {
        warn!(
            "Event {} no longer in {:?}, skipping move to {:?}",
            event.id, event.state, plan.state
        );
        return Ok(false);
    }
    Ok(true)
}
