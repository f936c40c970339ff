//! Test fixtures over an in-memory SQLite store

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::config::DatabaseConfig;
use crate::db;
use crate::entity::{event, event_option, group, user, user_and_group, EventState};

/// Fresh, migrated in-memory database
pub async fn setup_db() -> DatabaseConnection {
    let config = DatabaseConfig {
        db_type: "sqlite".to_string(),
        path: ":memory:".to_string(),
        ..Default::default()
    };
    db::init_database(&config)
        .await
        .expect("failed to set up in-memory database")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_time(time(h, min))
}

pub async fn seed_user(db: &DatabaseConnection, name: &str) -> user::Model {
    user::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_group(db: &DatabaseConnection, name: &str) -> group::Model {
    group::ActiveModel {
        name: Set(name.to_string()),
        description: Set(format!("{} group", name)),
        webhook_url: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_member(
    db: &DatabaseConnection,
    group_id: i32,
    user_id: i32,
) -> user_and_group::Model {
    user_and_group::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Group with `n` members, returning the group and the memberships
pub async fn seed_group_with_members(
    db: &DatabaseConnection,
    name: &str,
    n: usize,
) -> (group::Model, Vec<user_and_group::Model>) {
    let group = seed_group(db, name).await;
    let mut members = Vec::with_capacity(n);
    for i in 0..n {
        let user = seed_user(db, &format!("{}-member-{}", name, i)).await;
        members.push(seed_member(db, group.id, user.id).await);
    }
    (group, members)
}

pub async fn seed_event(
    db: &DatabaseConnection,
    group_id: i32,
    vote_end_date: Option<NaiveDateTime>,
) -> event::Model {
    event::ActiveModel {
        title: Set("Bouldering night".to_string()),
        color: Set("ff8800".to_string()),
        description: Set(None),
        vote_end_date: Set(vote_end_date),
        state: Set(EventState::Voting),
        chosen_option_id: Set(None),
        group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_option(
    db: &DatabaseConnection,
    event_id: i32,
    day: NaiveDate,
    start: NaiveTime,
    end: Option<NaiveTime>,
) -> event_option::Model {
    event_option::ActiveModel {
        date: Set(day),
        start_time: Set(start),
        end_time: Set(end),
        event_id: Set(event_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
