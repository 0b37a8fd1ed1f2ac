//! Leaderboard ranking
//!
//! Computed fresh from every run of the event on each call. Reads take no
//! locks; a ranking may miss a review committed while it was being built.
//! Adequate up to low thousands of participants.

use crate::{
    points::PointLedger,
    storage::Storage,
    types::{EventId, LeaderboardEntry},
    Result,
};
use std::cmp::Ordering;

/// Score descending, then duration ascending, then run ID for stability
pub fn compare(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.duration_seconds.cmp(&b.duration_seconds))
        .then(a.run_id.cmp(&b.run_id))
}

/// Sort entries and keep the first `top_k`
pub fn rank(mut entries: Vec<LeaderboardEntry>, top_k: usize) -> Vec<LeaderboardEntry> {
    entries.sort_by(compare);
    entries.truncate(top_k);
    entries
}

/// Ranked rows for an event
pub(crate) fn leaderboard(
    storage: &Storage,
    event_id: EventId,
    top_k: usize,
) -> Result<Vec<LeaderboardEntry>> {
    let event = storage.get_event(event_id)?;
    let ledger = PointLedger::new(storage);

    let entries = storage
        .event_runs(event_id)?
        .into_iter()
        .map(|run| {
            Ok(LeaderboardEntry {
                run_id: run.run_id,
                name: run.display_name.clone(),
                score: ledger.sum_for(run.run_id)?,
                duration_seconds: run.ranking_duration_seconds(&event),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(rank(entries, top_k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunId;

    fn entry(name: &str, score: i64, duration_seconds: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            run_id: RunId::new(),
            name: name.to_string(),
            score,
            duration_seconds,
        }
    }

    #[test]
    fn test_score_descending() {
        let ranked = rank(vec![entry("a", 10, 5), entry("b", 30, 500), entry("c", 20, 1)], 10);
        let names: Vec<&str> = ranked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_broken_by_duration() {
        let ranked = rank(vec![entry("slow", 100, 900), entry("fast", 100, 300)], 10);
        assert_eq!(ranked[0].name, "fast");
        assert_eq!(ranked[1].name, "slow");
    }

    #[test]
    fn test_top_k() {
        let entries = (0..10).map(|i| entry("p", i, 0)).collect();
        let ranked = rank(entries, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].score, 9);
    }
}
