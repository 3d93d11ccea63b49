//! Retrieval query construction.

use anima_core::memory::EpisodicMemory;
use anima_core::MemorySource;

/// Observation contents among `memories`, preserving their order.
///
/// Callers pass memories captured before the current observation was
/// written, so the current event never appears here.
#[must_use]
pub fn recent_utterances(memories: &[EpisodicMemory]) -> Vec<String> {
    memories
        .iter()
        .filter(|m| m.source == MemorySource::Observation)
        .map(|m| m.content.clone())
        .collect()
}

/// Build the retrieval query text.
///
/// `recent` is newest-first.  Up to `window` of the newest utterances are
/// emitted oldest-first, followed by the observation summary and the
/// current goal.
#[must_use]
pub fn build_retrieval_query(
    recent: &[String],
    window: usize,
    observation_summary: &str,
    goal: Option<&str>,
) -> String {
    let mut lines: Vec<&str> = recent.iter().take(window).rev().map(String::as_str).collect();
    lines.push(observation_summary);
    let mut query = lines.join("\n");
    if let Some(goal) = goal.map(str::trim).filter(|g| !g.is_empty()) {
        query.push_str(". Current goal: ");
        query.push_str(goal);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_goal() {
        let q = build_retrieval_query(&[], 5, "player_1 waves", Some("guard the gate"));
        assert_eq!(q, "player_1 waves. Current goal: guard the gate");
    }

    #[test]
    fn blank_goal_is_omitted() {
        assert_eq!(build_retrieval_query(&[], 5, "x", Some("  ")), "x");
        assert_eq!(build_retrieval_query(&[], 5, "x", None), "x");
    }

    #[test]
    fn window_keeps_newest_in_chronological_order() {
        let recent: Vec<String> = (1..=7).rev().map(|i| format!("u{i}")).collect();
        // newest-first: u7, u6, ... u1
        let q = build_retrieval_query(&recent, 5, "now", None);
        assert_eq!(q, "u3\nu4\nu5\nu6\nu7\nnow");
    }

    #[test]
    fn only_observations_count_as_utterances() {
        let obs = EpisodicMemory::new("n", "heard a song", MemorySource::Observation, 0.3, vec![], 0.7);
        let refl = EpisodicMemory::new("n", "I feel uneasy", MemorySource::Reflection, 0.3, vec![], 0.7);
        assert_eq!(recent_utterances(&[refl, obs]), vec!["heard a song".to_string()]);
    }
}
