//! Events and their candidate options

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::entity::{event, event_option, event_option_response, group, EventState};
use crate::error::{AppError, AppResult, OptionExt};

pub const MAX_TITLE_LEN: usize = 100;

#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub color: String,
    pub description: Option<String>,
    pub vote_end_date: Option<NaiveDateTime>,
}

/// Partial edit; `None` leaves a field as is.
///
/// The nullable fields take `Some(None)` to clear them.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub color: Option<String>,
    pub description: Option<Option<String>>,
    pub vote_end_date: Option<Option<NaiveDateTime>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewOption {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
}

/// An option together with every response it received
#[derive(Clone, Debug, Serialize)]
pub struct OptionDetail {
    pub option: event_option::Model,
    pub responses: Vec<event_option_response::Model>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EventDetail {
    pub event: event::Model,
    pub options: Vec<OptionDetail>,
}

impl EventDetail {
    pub fn chosen_option(&self) -> Option<&OptionDetail> {
        let chosen = self.event.chosen_option_id?;
        self.options.iter().find(|detail| detail.option.id == chosen)
    }
}

pub async fn create_event(
    db: &DatabaseConnection,
    group_id: i32,
    new_event: NewEvent,
) -> AppResult<event::Model> {
    group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("group {}", group_id))?;

    validate_title(&new_event.title)?;
    validate_color(&new_event.color)?;

    let event = event::ActiveModel {
        title: Set(new_event.title),
        color: Set(new_event.color.to_ascii_lowercase()),
        description: Set(new_event.description),
        vote_end_date: Set(new_event.vote_end_date),
        state: Set(EventState::Voting),
        chosen_option_id: Set(None),
        group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created event {} in group {}", event.id, group_id);
    Ok(event)
}

pub async fn update_event(
    db: &DatabaseConnection,
    event_id: i32,
    changes: EventChanges,
) -> AppResult<event::Model> {
    let event = find_event(db, event_id).await?;
    ensure_not_archived(&event)?;

    let mut active: event::ActiveModel = event.into();
    if let Some(title) = changes.title {
        validate_title(&title)?;
        active.title = Set(title);
    }
    if let Some(color) = changes.color {
        validate_color(&color)?;
        active.color = Set(color.to_ascii_lowercase());
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(vote_end_date) = changes.vote_end_date {
        active.vote_end_date = Set(vote_end_date);
    }

    let event = active.update(db).await?;
    debug!("Updated event {}", event.id);
    Ok(event)
}

/// Freeze an event from any state; archiving twice is a no-op
pub async fn archive_event(db: &DatabaseConnection, event_id: i32) -> AppResult<event::Model> {
    let event = find_event(db, event_id).await?;
    if event.state.is_archived() {
        return Ok(event);
    }

    let from = event.state;
    let mut active: event::ActiveModel = event.into();
    active.state = Set(EventState::Archived);
    let event = active.update(db).await?;

    info!("Event {} archived from {:?}", event.id, from);
    Ok(event)
}

pub async fn delete_event(db: &DatabaseConnection, event_id: i32) -> AppResult<()> {
    let event = find_event(db, event_id).await?;
    event::Entity::delete_by_id(event.id).exec(db).await?;
    info!("Deleted event {}", event.id);
    Ok(())
}

pub async fn add_option(
    db: &DatabaseConnection,
    event_id: i32,
    new_option: NewOption,
) -> AppResult<event_option::Model> {
    let event = find_event(db, event_id).await?;
    ensure_not_archived(&event)?;

    let option = event_option::ActiveModel {
        date: Set(new_option.date),
        start_time: Set(new_option.start_time),
        end_time: Set(new_option.end_time),
        event_id: Set(event.id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!("Added option {} to event {}", option.id, event.id);
    Ok(option)
}

/// Delete an option that is not its event's chosen option.
///
/// The option row is locked first, the same order the lifecycle sweep locks
/// it in before choosing it, and the delete itself re-checks that no event
/// points at the option.
pub async fn delete_option(db: &DatabaseConnection, option_id: i32) -> AppResult<()> {
    let event_id = db
        .transaction::<_, i32, AppError>(|txn| {
            Box::pin(async move {
                let option = event_option::Entity::find_by_id(option_id)
                    .lock_exclusive()
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("event option {}", option_id))?;
                let event = event::Entity::find_by_id(option.event_id)
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("event {}", option.event_id))?;
                ensure_not_archived(&event)?;

                let chosen_conflict = || {
                    AppError::Conflict(format!(
                        "option {} is the chosen option of event {}",
                        option.id, event.id
                    ))
                };
                if event.chosen_option_id == Some(option.id) {
                    return Err(chosen_conflict());
                }

                let chosen_options = Query::select()
                    .column(event::Column::ChosenOptionId)
                    .from(event::Entity)
                    .and_where(event::Column::ChosenOptionId.eq(option.id))
                    .to_owned();
                let result = event_option::Entity::delete_many()
                    .filter(event_option::Column::Id.eq(option.id))
                    .filter(event_option::Column::Id.not_in_subquery(chosen_options))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(chosen_conflict());
                }
                Ok(event.id)
            })
        })
        .await?;

    debug!("Deleted option {} of event {}", option_id, event_id);
    Ok(())
}

/// Event with options and responses, as stored. Callers wanting current
/// lifecycle states go through `AppState::event`.
pub async fn get_event_detail<C: ConnectionTrait>(conn: &C, event_id: i32) -> AppResult<EventDetail> {
    let event = event::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_not_found(format!("event {}", event_id))?;

    let mut details = load_details(conn, vec![event]).await?;
    details
        .pop()
        .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))
}

pub async fn list_group_events<C: ConnectionTrait>(conn: &C, group_id: i32) -> AppResult<Vec<EventDetail>> {
    group::Entity::find_by_id(group_id)
        .one(conn)
        .await?
        .ok_or_not_found(format!("group {}", group_id))?;

    let events = event::Entity::find()
        .filter(event::Column::GroupId.eq(group_id))
        .order_by_asc(event::Column::Id)
        .all(conn)
        .await?;
    load_details(conn, events).await
}

async fn load_details<C: ConnectionTrait>(conn: &C, events: Vec<event::Model>) -> AppResult<Vec<EventDetail>> {
    let event_ids: Vec<i32> = events.iter().map(|event| event.id).collect();
    let options = event_option::Entity::find()
        .filter(event_option::Column::EventId.is_in(event_ids))
        .order_by_asc(event_option::Column::Id)
        .all(conn)
        .await?;

    let option_ids: Vec<i32> = options.iter().map(|option| option.id).collect();
    let mut responses: HashMap<i32, Vec<event_option_response::Model>> = HashMap::new();
    for response in event_option_response::Entity::find()
        .filter(event_option_response::Column::EventOptionId.is_in(option_ids))
        .order_by_asc(event_option_response::Column::Id)
        .all(conn)
        .await?
    {
        responses.entry(response.event_option_id).or_default().push(response);
    }

    let mut options_by_event: HashMap<i32, Vec<OptionDetail>> = HashMap::new();
    for option in options {
        let option_responses = responses.remove(&option.id).unwrap_or_default();
        options_by_event.entry(option.event_id).or_default().push(OptionDetail {
            option,
            responses: option_responses,
        });
    }

    Ok(events
        .into_iter()
        .map(|event| {
            let options = options_by_event.remove(&event.id).unwrap_or_default();
            EventDetail { event, options }
        })
        .collect())
}

async fn find_event(db: &DatabaseConnection, event_id: i32) -> AppResult<event::Model> {
    event::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("event {}", event_id))
}

fn ensure_not_archived(event: &event::Model) -> AppResult<()> {
    if event.state.is_archived() {
        return Err(AppError::Conflict(format!("event {} is archived", event.id)));
    }
    Ok(())
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("event title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "event title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn validate_color(color: &str) -> AppResult<()> {
    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Validation(format!(
            "color must be 6 hex digits, got '{}'",
            color
        )));
    }
    Ok(())
}
