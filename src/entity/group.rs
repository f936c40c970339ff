//! Group entity
//!
//! Table: groups

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Group name (max 32 chars)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Notification target, delivered by the notification layer
    #[sea_orm(column_type = "String(Some(256))", nullable)]
    pub webhook_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// Owned tables reference groups with ON DELETE CASCADE

impl ActiveModelBehavior for ActiveModel {}
