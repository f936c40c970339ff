//! Event entity
//!
//! Table: events

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Event lifecycle state.
///
/// Discriminants follow the lifecycle order, so `Ord` compares progress.
/// `Archived` is an administrative terminal state reachable from any other.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, DeriveActiveEnum,
    Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Members are still responding to options
    #[sea_orm(num_value = 0)]
    Voting,
    /// An option was chosen, it has not started yet
    #[sea_orm(num_value = 1)]
    Open,
    /// The chosen option is in progress
    #[sea_orm(num_value = 2)]
    Active,
    /// The chosen option has ended
    #[sea_orm(num_value = 3)]
    Closed,
    /// Frozen by a manager, never touched again
    #[sea_orm(num_value = 4)]
    Archived,
}

impl EventState {
    /// States the lifecycle sweep may still move forward
    pub const RESOLVABLE: [EventState; 3] =
        [EventState::Voting, EventState::Open, EventState::Active];

    pub fn is_archived(self) -> bool {
        self == EventState::Archived
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "String(Some(100))")]
    pub title: String,

    /// Hex RGB without the leading '#'
    #[sea_orm(column_type = "String(Some(6))")]
    pub color: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Explicit voting deadline; derived from the options when absent
    pub vote_end_date: Option<DateTime>,

    pub state: EventState,

    /// Always one of this event's own options when set
    pub chosen_option_id: Option<i32>,

    pub group_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
}

// chosen_option_id is not declared as a foreign key: events and event_options
// would reference each other and the tables could not be created in order.

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
