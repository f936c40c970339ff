//! UserVoteOptionResponse entity - a member's selection of a vote option
//!
//! Table: user_vote_option_responses
//! Unique: (vote_option_id, user_and_group_id)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_vote_option_responses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub vote_option_id: i32,

    pub user_and_group_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vote_option::Entity",
        from = "Column::VoteOptionId",
        to = "super::vote_option::Column::Id",
        on_delete = "Cascade"
    )]
    VoteOption,

    #[sea_orm(
        belongs_to = "super::user_and_group::Entity",
        from = "Column::UserAndGroupId",
        to = "super::user_and_group::Column::Id",
        on_delete = "Cascade"
    )]
    UserAndGroup,
}

impl ActiveModelBehavior for ActiveModel {}
