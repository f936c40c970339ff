use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::entity::{event_option_response, invite, user_and_group, ResponseKind};
use crate::error::AppResult;
use crate::lifecycle::{self, SweepReport, Transition};
use crate::service::{self, EventDetail};

/// Shared application state
///
/// Every read of event state goes through here so that the lifecycle sweep
/// runs first and callers never see a stale state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Lifecycle transition sender
    pub transitions: broadcast::Sender<Transition>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let (transitions, _) = broadcast::channel(1000);

        Self {
            db,
            config: Arc::new(config),
            transitions,
        }
    }

    /// Wall-clock time in the naive local form events are stored in
    pub fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    pub fn today() -> NaiveDate {
        Self::now().date()
    }

    /// Sweep at the current time
    pub async fn resolve_lifecycle(&self) -> AppResult<SweepReport> {
        self.resolve_lifecycle_at(Self::now()).await
    }

    /// Sweep at `now` and publish every transition it made
    pub async fn resolve_lifecycle_at(&self, now: NaiveDateTime) -> AppResult<SweepReport> {
        let report = lifecycle::resolve_lifecycle(&self.db, now).await?;
        for transition in &report.transitions {
            // Ignore send errors (no receivers is fine)
            let _ = self.transitions.send(transition.clone());
        }
        Ok(report)
    }

    /// Subscribe to lifecycle transitions
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    pub async fn event(&self, event_id: i32) -> AppResult<EventDetail> {
        self.event_at(event_id, Self::now()).await
    }

    pub async fn event_at(&self, event_id: i32, now: NaiveDateTime) -> AppResult<EventDetail> {
        self.resolve_lifecycle_at(now).await?;
        service::event::get_event_detail(&self.db, event_id).await
    }

    pub async fn group_events(&self, group_id: i32) -> AppResult<Vec<EventDetail>> {
        self.group_events_at(group_id, Self::now()).await
    }

    pub async fn group_events_at(&self, group_id: i32, now: NaiveDateTime) -> AppResult<Vec<EventDetail>> {
        self.resolve_lifecycle_at(now).await?;
        service::event::list_group_events(&self.db, group_id).await
    }

    /// Record a response. State is resolved lazily on the next read.
    pub async fn submit_response(
        &self,
        option_id: i32,
        membership_id: i32,
        kind: ResponseKind,
        reason: Option<String>,
    ) -> AppResult<event_option_response::Model> {
        lifecycle::submit_response(&self.db, option_id, membership_id, kind, reason).await
    }

    /// Invite with the configured code length
    pub async fn create_invite(&self, group_id: i32, expiration_date: NaiveDate) -> AppResult<invite::Model> {
        service::invite::create_invite(
            &self.db,
            group_id,
            expiration_date,
            Self::today(),
            self.config.invites.code_length,
        )
        .await
    }

    pub async fn redeem_invite(&self, code: &str, user_id: i32) -> AppResult<user_and_group::Model> {
        debug!("User {} redeeming invite", user_id);
        service::invite::redeem_invite(&self.db, code, user_id, Self::today()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EventState;
    use crate::test_utils::{self, at, date, time};

    #[tokio::test]
    async fn test_transitions_are_broadcast() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "radio", 1).await;
        let event = test_utils::seed_event(&db, group.id, None).await;
        let option = test_utils::seed_option(&db, event.id, date(2024, 6, 10), time(18, 0), Some(time(20, 0))).await;

        let state = AppState::new(db, Config::default());
        let mut rx = state.subscribe();

        state
            .submit_response(option.id, members[0].id, ResponseKind::Accepted, None)
            .await
            .unwrap();

        let report = state.resolve_lifecycle_at(at(2024, 6, 10, 19, 0)).await.unwrap();
        assert_eq!(report.transitions.len(), 1);

        let transition = rx.recv().await.unwrap();
        assert_eq!(transition.event_id, event.id);
        assert_eq!(transition.group_id, group.id);
        assert_eq!(transition.from, EventState::Voting);
        assert_eq!(transition.to, EventState::Active);
        assert_eq!(transition.chosen_option_id, Some(option.id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reads_resolve_before_returning() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "readers", 2).await;
        let event = test_utils::seed_event(&db, group.id, None).await;
        let early = test_utils::seed_option(&db, event.id, date(2024, 6, 10), time(18, 0), None).await;
        let late = test_utils::seed_option(&db, event.id, date(2024, 6, 12), time(18, 0), None).await;

        let state = AppState::new(db, Config::default());
        for member in &members {
            state
                .submit_response(late.id, member.id, ResponseKind::Accepted, None)
                .await
                .unwrap();
        }
        state
            .submit_response(early.id, members[0].id, ResponseKind::Denied, None)
            .await
            .unwrap();

        let before = state.event_at(event.id, at(2024, 6, 9, 22, 0)).await.unwrap();
        assert_eq!(before.event.state, EventState::Voting);

        let listed = state.group_events_at(group.id, at(2024, 6, 9, 23, 0)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event.state, EventState::Open);
        assert_eq!(listed[0].event.chosen_option_id, Some(late.id));

        let during = state.event_at(event.id, at(2024, 6, 12, 18, 0)).await.unwrap();
        assert_eq!(during.event.state, EventState::Active);

        let after = state.event_at(event.id, at(2024, 6, 13, 0, 0)).await.unwrap();
        assert_eq!(after.event.state, EventState::Closed);
    }

    #[tokio::test]
    async fn test_invites_use_configured_length() {
        let db = test_utils::setup_db().await;
        let group = test_utils::seed_group(&db, "config").await;
        let user = test_utils::seed_user(&db, "joiner").await;

        let mut config = Config::default();
        config.invites.code_length = 24;
        let state = AppState::new(db, config);

        let expires = AppState::today() + chrono::Days::new(7);
        let invite = state.create_invite(group.id, expires).await.unwrap();
        assert_eq!(invite.code.len(), 24);

        let membership = state.redeem_invite(&invite.code, user.id).await.unwrap();
        assert_eq!(membership.group_id, group.id);
    }
}
