//! Tally calculator
//!
//! Counts ACCEPTED/DENIED responses per option and picks the winning option:
//! most accepts, else fewest denials, else the lowest option id. Ties always
//! go to the lowest option id.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::entity::{event, event_option, event_option_response, ResponseKind};
use crate::error::{AppResult, OptionExt};

/// Response counts of a single option
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub accepted: u32,
    pub denied: u32,
}

/// Per-option counts of one event and the option they select
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub chosen_option_id: Option<i32>,
    pub counts: BTreeMap<i32, OptionCount>,
}

impl Tally {
    /// Build a tally for `option_ids`; responses to other options are ignored.
    pub fn from_responses<I, R>(option_ids: I, responses: R) -> Self
    where
        I: IntoIterator<Item = i32>,
        R: IntoIterator<Item = (i32, ResponseKind)>,
    {
        let mut counts: BTreeMap<i32, OptionCount> = option_ids
            .into_iter()
            .map(|id| (id, OptionCount::default()))
            .collect();

        for (option_id, kind) in responses {
            if let Some(count) = counts.get_mut(&option_id) {
                match kind {
                    ResponseKind::Accepted => count.accepted += 1,
                    ResponseKind::Denied => count.denied += 1,
                }
            }
        }

        Self {
            chosen_option_id: select_option(&counts),
            counts,
        }
    }
}

/// Pick the winning option id, `None` only when there are no options.
pub fn select_option(counts: &BTreeMap<i32, OptionCount>) -> Option<i32> {
    if counts.values().any(|count| count.accepted > 0) {
        counts
            .iter()
            .max_by_key(|&(&id, count)| (count.accepted, Reverse(id)))
            .map(|(&id, _)| id)
    } else {
        // With no responses at all every denial count is zero and the lowest id wins
        counts
            .iter()
            .min_by_key(|&(&id, count)| (count.denied, id))
            .map(|(&id, _)| id)
    }
}

const RESPONSE_BATCH_SIZE: usize = 1000;

/// Responses for the given options, grouped by option id
pub(crate) async fn responses_by_option<C: ConnectionTrait>(
    conn: &C,
    option_ids: &[i32],
) -> AppResult<HashMap<i32, Vec<ResponseKind>>> {
    let mut grouped: HashMap<i32, Vec<ResponseKind>> = HashMap::new();
    if option_ids.is_empty() {
        return Ok(grouped);
    }

    // Keep each statement well below the bind parameter limit of the backends
    for chunk in option_ids.chunks(RESPONSE_BATCH_SIZE) {
        let responses = event_option_response::Entity::find()
            .filter(event_option_response::Column::EventOptionId.is_in(chunk.iter().copied()))
            .all(conn)
            .await?;

        for response in responses {
            grouped
                .entry(response.event_option_id)
                .or_default()
                .push(response.response);
        }
    }
    Ok(grouped)
}

/// Tally of one event, read-only.
pub async fn compute_tally<C: ConnectionTrait>(conn: &C, event_id: i32) -> AppResult<Tally> {
    event::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_not_found(format!("event {}", event_id))?;

    let option_ids: Vec<i32> = event_option::Entity::find()
        .filter(event_option::Column::EventId.eq(event_id))
        .order_by_asc(event_option::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|option| option.id)
        .collect();

    let grouped = responses_by_option(conn, &option_ids).await?;
    let responses = grouped
        .into_iter()
        .flat_map(|(option_id, kinds)| kinds.into_iter().map(move |kind| (option_id, kind)));

    Ok(Tally::from_responses(option_ids, responses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::test_utils::{self, date, time};
    use sea_orm::{ActiveModelTrait, Set};
    use ResponseKind::{Accepted, Denied};

    fn repeat(option_id: i32, kind: ResponseKind, n: usize) -> Vec<(i32, ResponseKind)> {
        vec![(option_id, kind); n]
    }

    #[test]
    fn test_most_accepted_wins() {
        let mut responses = repeat(1, Accepted, 1);
        responses.extend(repeat(2, Accepted, 4));
        responses.extend(repeat(3, Accepted, 2));
        let tally = Tally::from_responses([1, 2, 3], responses);
        assert_eq!(tally.chosen_option_id, Some(2));
        assert_eq!(tally.counts[&2], OptionCount { accepted: 4, denied: 0 });
    }

    #[test]
    fn test_accept_tie_goes_to_lowest_id() {
        let mut responses = repeat(2, Accepted, 3);
        responses.extend(repeat(1, Accepted, 3));
        let tally = Tally::from_responses([2, 1], responses);
        assert_eq!(tally.chosen_option_id, Some(1));
    }

    #[test]
    fn test_accepts_outweigh_denials() {
        // One accept beats an option nobody rejected
        let mut responses = repeat(1, Denied, 5);
        responses.push((1, Accepted));
        let tally = Tally::from_responses([1, 2], responses);
        assert_eq!(tally.chosen_option_id, Some(1));
    }

    #[test]
    fn test_fewest_denials_without_accepts() {
        let mut responses = repeat(1, Denied, 5);
        responses.extend(repeat(2, Denied, 2));
        let tally = Tally::from_responses([1, 2], responses);
        assert_eq!(tally.chosen_option_id, Some(2));
    }

    #[test]
    fn test_denial_tie_goes_to_lowest_id() {
        let mut responses = repeat(7, Denied, 2);
        responses.extend(repeat(4, Denied, 2));
        let tally = Tally::from_responses([7, 4], responses);
        assert_eq!(tally.chosen_option_id, Some(4));
    }

    #[test]
    fn test_no_responses_falls_back_to_lowest_id() {
        let tally = Tally::from_responses([5, 2, 9], Vec::new());
        assert_eq!(tally.chosen_option_id, Some(2));
        assert_eq!(tally.counts.len(), 3);
    }

    #[test]
    fn test_no_options_selects_nothing() {
        let tally = Tally::from_responses(Vec::new(), repeat(1, Accepted, 3));
        assert_eq!(tally.chosen_option_id, None);
        assert!(tally.counts.is_empty());
    }

    #[tokio::test]
    async fn test_compute_tally_reads_store() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "hikers", 3).await;
        let event = test_utils::seed_event(&db, group.id, None).await;
        let first = test_utils::seed_option(&db, event.id, date(2024, 6, 10), time(18, 0), None).await;
        let second = test_utils::seed_option(&db, event.id, date(2024, 6, 12), time(18, 0), None).await;

        let answers = [
            (first.id, members[0].id, Denied),
            (second.id, members[0].id, Accepted),
            (second.id, members[1].id, Accepted),
            (first.id, members[2].id, Accepted),
        ];
        for (option_id, membership_id, kind) in answers {
            event_option_response::ActiveModel {
                response: Set(kind),
                reason: Set(None),
                event_option_id: Set(option_id),
                user_and_group_id: Set(membership_id),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let tally = compute_tally(&db, event.id).await.unwrap();
        assert_eq!(tally.chosen_option_id, Some(second.id));
        assert_eq!(tally.counts[&first.id], OptionCount { accepted: 1, denied: 1 });
        assert_eq!(tally.counts[&second.id], OptionCount { accepted: 2, denied: 0 });
    }

    #[tokio::test]
    async fn test_responses_by_option_spans_batches() {
        let db = test_utils::setup_db().await;
        let (group, members) = test_utils::seed_group_with_members(&db, "batches", 1).await;
        let event = test_utils::seed_event(&db, group.id, None).await;
        let option = test_utils::seed_option(&db, event.id, date(2024, 6, 10), time(18, 0), None).await;
        event_option_response::ActiveModel {
            response: Set(Denied),
            reason: Set(None),
            event_option_id: Set(option.id),
            user_and_group_id: Set(members[0].id),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        // Real option sits in the last batch, behind ids that match nothing
        let mut option_ids: Vec<i32> = (100_000..100_000 + 2 * RESPONSE_BATCH_SIZE as i32).collect();
        option_ids.push(option.id);

        let grouped = responses_by_option(&db, &option_ids).await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[&option.id], vec![Denied]);
    }

    #[tokio::test]
    async fn test_compute_tally_unknown_event() {
        let db = test_utils::setup_db().await;
        let result = compute_tally(&db, 42).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
