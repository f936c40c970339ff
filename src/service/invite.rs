//! Group invites
//!
//! Expired invites are purged eagerly whenever invites are read.

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{group, invite, user, user_and_group};
use crate::error::{AppError, AppResult, OptionExt};

const MAX_CODE_ATTEMPTS: usize = 5;

/// Random hex code of `length` characters (at most 64)
pub fn generate_code(length: usize) -> String {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    let mut code = hex::encode(digest);
    code.truncate(length);
    code
}

pub async fn create_invite(
    db: &DatabaseConnection,
    group_id: i32,
    expiration_date: NaiveDate,
    today: NaiveDate,
    code_length: usize,
) -> AppResult<invite::Model> {
    group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("group {}", group_id))?;

    if expiration_date < today {
        return Err(AppError::Validation(format!(
            "expiration date {} is in the past",
            expiration_date
        )));
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code(code_length);
        let taken = invite::Entity::find()
            .filter(invite::Column::Code.eq(code.as_str()))
            .one(db)
            .await?;
        if taken.is_some() {
            debug!("Invite code collision, regenerating");
            continue;
        }

        let invite = invite::ActiveModel {
            code: Set(code),
            expiration_date: Set(expiration_date),
            group_id: Set(group_id),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("Created invite {} for group {}", invite.id, group_id);
        return Ok(invite);
    }

    Err(AppError::Conflict("could not generate a unique invite code".to_string()))
}

/// Join the invite's group. The code stays valid until it expires.
pub async fn redeem_invite(
    db: &DatabaseConnection,
    code: &str,
    user_id: i32,
    today: NaiveDate,
) -> AppResult<user_and_group::Model> {
    let code = code.to_string();
    let membership = db
        .transaction::<_, user_and_group::Model, AppError>(|txn| {
            Box::pin(async move {
                let invite = invite::Entity::find()
                    .filter(invite::Column::Code.eq(code.as_str()))
                    .filter(invite::Column::ExpirationDate.gte(today))
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("invite '{}'", code))?;

                user::Entity::find_by_id(user_id)
                    .one(txn)
                    .await?
                    .ok_or_not_found(format!("user {}", user_id))?;

                let existing = user_and_group::Entity::find()
                    .filter(user_and_group::Column::GroupId.eq(invite.group_id))
                    .filter(user_and_group::Column::UserId.eq(user_id))
                    .one(txn)
                    .await?;
                if existing.is_some() {
                    return Err(AppError::Conflict(format!(
                        "user {} already belongs to group {}",
                        user_id, invite.group_id
                    )));
                }

                let membership = user_and_group::ActiveModel {
                    user_id: Set(user_id),
                    group_id: Set(invite.group_id),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(membership)
            })
        })
        .await?;

    info!("User {} joined group {} by invite", user_id, membership.group_id);
    Ok(membership)
}

/// Delete invites that expired before `today`
pub async fn purge_expired_invites(db: &DatabaseConnection, today: NaiveDate) -> AppResult<u64> {
    let result = invite::Entity::delete_many()
        .filter(invite::Column::ExpirationDate.lt(today))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!("Purged {} expired invite(s)", result.rows_affected);
    }
    Ok(result.rows_affected)
}

pub async fn list_group_invites(
    db: &DatabaseConnection,
    group_id: i32,
    today: NaiveDate,
) -> AppResult<Vec<invite::Model>> {
    purge_expired_invites(db, today).await?;

    let invites = invite::Entity::find()
        .filter(invite::Column::GroupId.eq(group_id))
        .order_by_asc(invite::Column::ExpirationDate)
        .order_by_asc(invite::Column::Id)
        .all(db)
        .await?;
    Ok(invites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, date};

    #[test]
    fn test_generate_code() {
        let code = generate_code(16);
        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(generate_code(64).len(), 64);
        assert_ne!(generate_code(32), generate_code(32));
    }

    #[tokio::test]
    async fn test_create_and_redeem() {
        let db = test_utils::setup_db().await;
        let group = test_utils::seed_group(&db, "hikers").await;
        let user = test_utils::seed_user(&db, "newbie").await;
        let today = date(2024, 6, 1);

        let invite = create_invite(&db, group.id, today, today, 16).await.unwrap();
        assert_eq!(invite.code.len(), 16);

        let membership = redeem_invite(&db, &invite.code, user.id, today).await.unwrap();
        assert_eq!(membership.group_id, group.id);
        assert_eq!(membership.user_id, user.id);

        assert!(matches!(
            redeem_invite(&db, &invite.code, user.id, today).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_past_expiration() {
        let db = test_utils::setup_db().await;
        let group = test_utils::seed_group(&db, "late").await;
        assert!(matches!(
            create_invite(&db, group.id, date(2024, 5, 31), date(2024, 6, 1), 16).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_invite(&db, 999, date(2024, 6, 1), date(2024, 6, 1), 16).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_or_unknown_code_is_not_found() {
        let db = test_utils::setup_db().await;
        let group = test_utils::seed_group(&db, "gone").await;
        let user = test_utils::seed_user(&db, "tardy").await;
        let invite = create_invite(&db, group.id, date(2024, 6, 1), date(2024, 6, 1), 16)
            .await
            .unwrap();

        assert!(matches!(
            redeem_invite(&db, &invite.code, user.id, date(2024, 6, 2)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            redeem_invite(&db, "0000000000000000", user.id, date(2024, 6, 1)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_purges_expired() {
        let db = test_utils::setup_db().await;
        let group = test_utils::seed_group(&db, "tidy").await;
        let created = date(2024, 6, 1);
        create_invite(&db, group.id, date(2024, 6, 1), created, 16).await.unwrap();
        let lasting = create_invite(&db, group.id, date(2024, 6, 30), created, 16).await.unwrap();

        let listed = list_group_invites(&db, group.id, date(2024, 6, 2)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, lasting.id);
        assert_eq!(invite::Entity::find().all(&db).await.unwrap().len(), 1);

        assert_eq!(purge_expired_invites(&db, date(2024, 7, 1)).await.unwrap(), 1);
    }
}
