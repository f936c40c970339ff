//! UserEventOptionResponse entity
//!
//! Table: user_event_option_responses
//! Unique: (event_option_id, user_and_group_id)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A member's answer to one event option
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    #[sea_orm(num_value = 1)]
    Accepted,
    #[sea_orm(num_value = 2)]
    Denied,
}

impl TryFrom<i32> for ResponseKind {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ResponseKind::Accepted),
            2 => Ok(ResponseKind::Denied),
            other => Err(AppError::Validation(format!(
                "unknown response kind {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_event_option_responses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub response: ResponseKind,

    /// Free-text reason, typically given with a denial
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,

    pub event_option_id: i32,

    pub user_and_group_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event_option::Entity",
        from = "Column::EventOptionId",
        to = "super::event_option::Column::Id",
        on_delete = "Cascade"
    )]
    EventOption,

    #[sea_orm(
        belongs_to = "super::user_and_group::Entity",
        from = "Column::UserAndGroupId",
        to = "super::user_and_group::Column::Id",
        on_delete = "Cascade"
    )]
    UserAndGroup,
}

impl Related<super::event_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
