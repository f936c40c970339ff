//! Deadline resolver
//!
//! An explicit `vote_end_date` is authoritative. Without one, voting closes at
//! 23:00 on the day before the earliest proposed option.

use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::{event, event_option};
use crate::error::{AppResult, OptionExt};

/// Hour of the derived deadline, local time
pub const DERIVED_DEADLINE_HOUR: u32 = 23;

/// Voting-close instant, `None` when there is neither a deadline nor an option.
pub fn compute_deadline<I>(vote_end_date: Option<NaiveDateTime>, option_dates: I) -> Option<NaiveDateTime>
where
    I: IntoIterator<Item = NaiveDate>,
{
    if let Some(explicit) = vote_end_date {
        return Some(explicit);
    }

    let earliest = option_dates.into_iter().min()?;
    earliest.pred_opt()?.and_hms_opt(DERIVED_DEADLINE_HOUR, 0, 0)
}

pub fn event_deadline(event: &event::Model, options: &[event_option::Model]) -> Option<NaiveDateTime> {
    compute_deadline(event.vote_end_date, options.iter().map(|option| option.date))
}

/// Deadline of a stored event
pub async fn deadline_for_event<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
) -> AppResult<Option<NaiveDateTime>> {
    let event = event::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_not_found(format!("event {}", event_id))?;

    let options = event_option::Entity::find()
        .filter(event_option::Column::EventId.eq(event_id))
        .all(conn)
        .await?;

    Ok(event_deadline(&event, &options))
}
