//! Users, groups and membership

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::info;

use crate::entity::{group, user, user_and_group};
use crate::error::{AppError, AppResult, OptionExt};

pub const MAX_NAME_LEN: usize = 32;

pub async fn create_user(db: &DatabaseConnection, name: &str) -> AppResult<user::Model> {
    validate_name("user", name)?;

    let existing = user::Entity::find()
        .filter(user::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!("user name '{}' is taken", name)));
    }

    let user = user::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created user {} ({})", user.id, user.name);
    Ok(user)
}

pub async fn create_group(
    db: &DatabaseConnection,
    name: &str,
    description: &str,
    webhook_url: Option<String>,
) -> AppResult<group::Model> {
    validate_name("group", name)?;

    let existing = group::Entity::find()
        .filter(group::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!("group name '{}' is taken", name)));
    }

    let group = group::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.to_string()),
        webhook_url: Set(webhook_url),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created group {} ({})", group.id, group.name);
    Ok(group)
}

/// Delete a group together with everything hanging off it
pub async fn delete_group(db: &DatabaseConnection, group_id: i32) -> AppResult<()> {
    let group = group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("group {}", group_id))?;

    group::Entity::delete_by_id(group.id).exec(db).await?;

    info!("Deleted group {} ({})", group.id, group.name);
    Ok(())
}

pub async fn add_member(
    db: &DatabaseConnection,
    group_id: i32,
    user_id: i32,
) -> AppResult<user_and_group::Model> {
    let membership = db
        .transaction::<_, user_and_group::Model, AppError>(|txn| {
            Box::pin(async move {
                group::Entity::find_by_id(group_id)
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("group {}", group_id))?;
                user::Entity::find_by_id(user_id)
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("user {}", user_id))?;

                let existing = user_and_group::Entity::find()
                    .filter(user_and_group::Column::GroupId.eq(group_id))
                    .filter(user_and_group::Column::UserId.eq(user_id))
                    .one(txn)
                    .await?;
                if existing.is_some() {
                    return Err(AppError::Conflict(format!(
                        "user {} already belongs to group {}",
                        user_id, group_id
                    )));
                }

                let membership = user_and_group::ActiveModel {
                    user_id: Set(user_id),
                    group_id: Set(group_id),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(membership)
            })
        })
        .await?;

    info!("User {} joined group {}", user_id, group_id);
    Ok(membership)
}

/// Remove a membership; its event and poll responses go with it
pub async fn remove_member(db: &DatabaseConnection, group_id: i32, user_id: i32) -> AppResult<()> {
    let membership = membership(db, group_id, user_id)
        .await?
        .ok_or_not_found(format!("user {} in group {}", user_id, group_id))?;

    user_and_group::Entity::delete_by_id(membership.id).exec(db).await?;

    info!("User {} left group {}", user_id, group_id);
    Ok(())
}

pub async fn membership(
    db: &DatabaseConnection,
    group_id: i32,
    user_id: i32,
) -> AppResult<Option<user_and_group::Model>> {
    let membership = user_and_group::Entity::find()
        .filter(user_and_group::Column::GroupId.eq(group_id))
        .filter(user_and_group::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(membership)
}

pub async fn group_members(
    db: &DatabaseConnection,
    group_id: i32,
) -> AppResult<Vec<user_and_group::Model>> {
    let members = user_and_group::Entity::find()
        .filter(user_and_group::Column::GroupId.eq(group_id))
        .order_by_asc(user_and_group::Column::Id)
        .all(db)
        .await?;
    Ok(members)
}

fn validate_name(kind: &str, name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{} name must not be empty", kind)));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{} name must be at most {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(())
}
