//! Polls
//!
//! Independent of the event lifecycle: a poll never resolves, it only counts.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::entity::{group, user_and_group, vote, vote_option, vote_option_response};
use crate::error::{AppError, AppResult, OptionExt};

/// What a toggle did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ToggleOutcome {
    Selected,
    Withdrawn,
}

#[derive(Clone, Debug, Serialize)]
pub struct OptionSelections {
    pub option: vote_option::Model,
    pub selections: u64,
}

pub async fn create_vote(
    db: &DatabaseConnection,
    group_id: i32,
    title: &str,
    multi_select: bool,
) -> AppResult<vote::Model> {
    group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("group {}", group_id))?;
    validate_title(title)?;

    let vote = vote::ActiveModel {
        title: Set(title.to_string()),
        multi_select: Set(multi_select),
        group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created vote {} in group {}", vote.id, group_id);
    Ok(vote)
}

pub async fn add_vote_option(db: &DatabaseConnection, vote_id: i32, title: &str) -> AppResult<vote_option::Model> {
    vote::Entity::find_by_id(vote_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("vote {}", vote_id))?;
    validate_title(title)?;

    let option = vote_option::ActiveModel {
        title: Set(title.to_string()),
        vote_id: Set(vote_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(option)
}

pub async fn delete_vote(db: &DatabaseConnection, vote_id: i32) -> AppResult<()> {
    let result = vote::Entity::delete_by_id(vote_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("vote {}", vote_id)));
    }
    info!("Deleted vote {}", vote_id);
    Ok(())
}

pub async fn delete_vote_option(db: &DatabaseConnection, option_id: i32) -> AppResult<()> {
    let result = vote_option::Entity::delete_by_id(option_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("vote option {}", option_id)));
    }
    debug!("Deleted vote option {}", option_id);
    Ok(())
}

/// Select an option. In a single-select vote this replaces the member's
/// previous choice.
pub async fn select_vote_option(
    db: &DatabaseConnection,
    option_id: i32,
    membership_id: i32,
) -> AppResult<vote_option_response::Model> {
    let selection = db
        .transaction::<_, vote_option_response::Model, AppError>(|txn| {
            Box::pin(async move {
                if find_selection(txn, option_id, membership_id).await?.is_some() {
                    return Err(AppError::Conflict(format!(
                        "membership {} already selected vote option {}",
                        membership_id, option_id
                    )));
                }
                select_in(txn, option_id, membership_id).await
            })
        })
        .await?;

    debug!("Membership {} selected vote option {}", membership_id, option_id);
    Ok(selection)
}

pub async fn toggle_vote_option(
    db: &DatabaseConnection,
    option_id: i32,
    membership_id: i32,
) -> AppResult<ToggleOutcome> {
    let outcome = db
        .transaction::<_, ToggleOutcome, AppError>(|txn| {
            Box::pin(async move {
                match find_selection(txn, option_id, membership_id).await? {
                    Some(existing) => {
                        vote_option_response::Entity::delete_by_id(existing.id)
                            .exec(txn)
                            .await?;
                        Ok(ToggleOutcome::Withdrawn)
                    }
                    None => {
                        select_in(txn, option_id, membership_id).await?;
                        Ok(ToggleOutcome::Selected)
                    }
                }
            })
        })
        .await?;

    debug!(
        "Membership {} toggled vote option {}: {:?}",
        membership_id, option_id, outcome
    );
    Ok(outcome)
}

pub async fn withdraw_vote_option(db: &DatabaseConnection, option_id: i32, membership_id: i32) -> AppResult<()> {
    let result = vote_option_response::Entity::delete_many()
        .filter(vote_option_response::Column::VoteOptionId.eq(option_id))
        .filter(vote_option_response::Column::UserAndGroupId.eq(membership_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "selection of vote option {} by membership {}",
            option_id, membership_id
        )));
    }
    Ok(())
}

/// Selection counts per option, ordered by option id
pub async fn vote_tally(db: &DatabaseConnection, vote_id: i32) -> AppResult<Vec<OptionSelections>> {
    vote::Entity::find_by_id(vote_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("vote {}", vote_id))?;

    let options = vote_option::Entity::find()
        .filter(vote_option::Column::VoteId.eq(vote_id))
        .order_by_asc(vote_option::Column::Id)
        .all(db)
        .await?;

    let option_ids: Vec<i32> = options.iter().map(|option| option.id).collect();
    let mut counts: HashMap<i32, u64> = HashMap::new();
    for selection in vote_option_response::Entity::find()
        .filter(vote_option_response::Column::VoteOptionId.is_in(option_ids))
        .all(db)
        .await?
    {
        *counts.entry(selection.vote_option_id).or_default() += 1;
    }

    Ok(options
        .into_iter()
        .map(|option| {
            let selections = counts.get(&option.id).copied().unwrap_or(0);
            OptionSelections { option, selections }
        })
        .collect())
}

async fn find_selection(
    txn: &DatabaseTransaction,
    option_id: i32,
    membership_id: i32,
) -> AppResult<Option<vote_option_response::Model>> {
    let selection = vote_option_response::Entity::find()
        .filter(vote_option_response::Column::VoteOptionId.eq(option_id))
        .filter(vote_option_response::Column::UserAndGroupId.eq(membership_id))
        .one(txn)
        .await?;
    Ok(selection)
}

async fn select_in(
    txn: &DatabaseTransaction,
    option_id: i32,
    membership_id: i32,
) -> AppResult<vote_option_response::Model> {
    let option = vote_option::Entity::find_by_id(option_id)
        .one(txn)
        .await?
        .ok_or_not_found(format!("vote option {}", option_id))?;
    let vote = vote::Entity::find_by_id(option.vote_id)
        .one(txn)
        .await?
        .ok_or_not_found(format!("vote {}", option.vote_id))?;

    let membership = user_and_group::Entity::find_by_id(membership_id).one(txn).await?;
    if !matches!(membership, Some(ref m) if m.group_id == vote.group_id) {
        return Err(AppError::Forbidden(format!(
            "membership {} does not belong to group {}",
            membership_id, vote.group_id
        )));
    }

    if !vote.multi_select {
        let siblings: Vec<i32> = vote_option::Entity::find()
            .filter(vote_option::Column::VoteId.eq(vote.id))
            .filter(vote_option::Column::Id.ne(option.id))
            .all(txn)
            .await?
            .into_iter()
            .map(|sibling| sibling.id)
            .collect();
        vote_option_response::Entity::delete_many()
            .filter(vote_option_response::Column::UserAndGroupId.eq(membership_id))
            .filter(vote_option_response::Column::VoteOptionId.is_in(siblings))
            .exec(txn)
            .await?;
    }

    let selection = vote_option_response::ActiveModel {
        vote_option_id: Set(option.id),
        user_and_group_id: Set(membership_id),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    Ok(selection)
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() || title.chars().count() > 100 {
        return Err(AppError::Validation(
            "title must be between 1 and 100 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn counts(db: &DatabaseConnection, vote_id: i32) -> Vec<u64> {
        vote_tally(db, vote_id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.selections)
            .collect()
    }

    #[tokio::test]
    async fn test_single_select_replaces_previous_choice() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "lunch", 2).await;
        let vote = create_vote(&db, group.id, "Where to eat", false).await.unwrap();
        let pizza = add_vote_option(&db, vote.id, "Pizza").await.unwrap();
        let ramen = add_vote_option(&db, vote.id, "Ramen").await.unwrap();

        select_vote_option(&db, pizza.id, members[0].id).await.unwrap();
        select_vote_option(&db, pizza.id, members[1].id).await.unwrap();
        assert_eq!(counts(&db, vote.id).await, vec![2, 0]);

        select_vote_option(&db, ramen.id, members[0].id).await.unwrap();
        assert_eq!(counts(&db, vote.id).await, vec![1, 1]);

        assert!(matches!(
            select_vote_option(&db, ramen.id, members[0].id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_multi_select_keeps_choices() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "games", 1).await;
        let vote = create_vote(&db, group.id, "What to play", true).await.unwrap();
        let first = add_vote_option(&db, vote.id, "Catan").await.unwrap();
        let second = add_vote_option(&db, vote.id, "Azul").await.unwrap();

        select_vote_option(&db, first.id, members[0].id).await.unwrap();
        select_vote_option(&db, second.id, members[0].id).await.unwrap();
        assert_eq!(counts(&db, vote.id).await, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_toggle_and_withdraw() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "movie", 1).await;
        let vote = create_vote(&db, group.id, "Film", false).await.unwrap();
        let option = add_vote_option(&db, vote.id, "Alien").await.unwrap();

        assert_eq!(
            toggle_vote_option(&db, option.id, members[0].id).await.unwrap(),
            ToggleOutcome::Selected
        );
        assert_eq!(
            toggle_vote_option(&db, option.id, members[0].id).await.unwrap(),
            ToggleOutcome::Withdrawn
        );
        assert_eq!(counts(&db, vote.id).await, vec![0]);

        assert!(matches!(
            withdraw_vote_option(&db, option.id, members[0].id).await,
            Err(AppError::NotFound(_))
        ));
        select_vote_option(&db, option.id, members[0].id).await.unwrap();
        withdraw_vote_option(&db, option.id, members[0].id).await.unwrap();
        assert_eq!(counts(&db, vote.id).await, vec![0]);
    }

    #[tokio::test]
    async fn test_outsider_cannot_select() {
        let db = test_utils::setup_db().await;
        let (group, _) = test_utils::seed_group_with_members(&db, "inside", 1).await;
        let (_, outsiders) = test_utils::seed_group_with_members(&db, "outside", 1).await;
        let vote = create_vote(&db, group.id, "Members only", false).await.unwrap();
        let option = add_vote_option(&db, vote.id, "Yes").await.unwrap();

        assert!(matches!(
            select_vote_option(&db, option.id, outsiders[0].id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            toggle_vote_option(&db, option.id, outsiders[0].id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            select_vote_option(&db, 999, outsiders[0].id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(counts(&db, vote.id).await, vec![0]);
    }

    #[tokio::test]
    async fn test_delete_vote_and_options() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "trash", 1).await;
        let vote = create_vote(&db, group.id, "Bin day", true).await.unwrap();
        let keep = add_vote_option(&db, vote.id, "Monday").await.unwrap();
        let dropped = add_vote_option(&db, vote.id, "Tuesday").await.unwrap();
        select_vote_option(&db, dropped.id, members[0].id).await.unwrap();

        delete_vote_option(&db, dropped.id).await.unwrap();
        let tally = vote_tally(&db, vote.id).await.unwrap();
        assert_eq!(tally.len(), 1);
        assert_eq!(tally[0].option.id, keep.id);
        assert!(matches!(delete_vote_option(&db, dropped.id).await, Err(AppError::NotFound(_))));

        delete_vote(&db, vote.id).await.unwrap();
        assert!(matches!(vote_tally(&db, vote.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(delete_vote(&db, vote.id).await, Err(AppError::NotFound(_))));
    }
}
