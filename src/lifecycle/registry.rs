//! Response registry
//!
//! Records a member's single response per event option. Submitting never
//! resolves the event; the next sweep-triggering read does.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::entity::{event, event_option, event_option_response, user_and_group, EventState, ResponseKind};
use crate::error::{AppError, AppResult, OptionExt};

/// Create or overwrite the response of `membership_id` to `option_id`.
///
/// Errors: `NotFound` for a missing option or event, `Conflict` once the
/// event left VOTING, `Forbidden` when the membership is not part of the
/// event's group.
pub async fn submit_response(
    db: &DatabaseConnection,
    option_id: i32,
    membership_id: i32,
    kind: ResponseKind,
    reason: Option<String>,
) -> AppResult<event_option_response::Model> {
    let response = db
        .transaction::<_, event_option_response::Model, AppError>(|txn| {
            Box::pin(async move { record_response(txn, option_id, membership_id, kind, reason).await })
        })
        .await?;

    debug!(
        "Membership {} answered {:?} to option {}",
        membership_id, kind, option_id
    );
    Ok(response)
}

async fn record_response(
    txn: &DatabaseTransaction,
    option_id: i32,
    membership_id: i32,
    kind: ResponseKind,
    reason: Option<String>,
) -> AppResult<event_option_response::Model> {
    let option = event_option::Entity::find_by_id(option_id)
        .one(txn)
        .await?
        .ok_or_not_found(format!("event option {}", option_id))?;

    let event = event::Entity::find_by_id(option.event_id)
        .one(txn)
        .await?
        .ok_or_not_found(format!("event {}", option.event_id))?;

    if event.state != EventState::Voting {
        return Err(AppError::Conflict(format!(
            "the voting period of event {} is over",
            event.id
        )));
    }

    let membership = user_and_group::Entity::find_by_id(membership_id).one(txn).await?;
    if !matches!(membership, Some(ref m) if m.group_id == event.group_id) {
        return Err(AppError::Forbidden(format!(
            "membership {} does not belong to group {}",
            membership_id, event.group_id
        )));
    }

    // Upsert keyed on the unique (option, membership) index, safe against a racing insert
    let record = event_option_response::ActiveModel {
        response: Set(kind),
        reason: Set(reason),
        event_option_id: Set(option_id),
        user_and_group_id: Set(membership_id),
        ..Default::default()
    };
    event_option_response::Entity::insert(record)
        .on_conflict(
            OnConflict::columns([
                event_option_response::Column::EventOptionId,
                event_option_response::Column::UserAndGroupId,
            ])
            .update_columns([
                event_option_response::Column::Response,
                event_option_response::Column::Reason,
            ])
            .to_owned(),
        )
        .exec(txn)
        .await?;

    let stored = event_option_response::Entity::find()
        .filter(event_option_response::Column::EventOptionId.eq(option_id))
        .filter(event_option_response::Column::UserAndGroupId.eq(membership_id))
        .one(txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("response vanished after upsert".to_string()))?;

    Ok(stored)
}
