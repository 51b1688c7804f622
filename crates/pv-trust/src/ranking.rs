//! Reputation scoring policy over the trust records.
//!
//! Pure functions: scores are computed from identity snapshots and are
//! never written back. The stored trust level stays a manual decision;
//! these numbers are advisory input for callers that want one.
//!
//! [`interaction_score`] condenses one identity's behaviour into a
//! value in `[-5, +5]`: completed transfers and volume count for it,
//! failures and slow links against it, the whole history decays
//! exponentially with a 30-day time constant, and recommendations add
//! a bounded bonus. [`trust_rank`] blends the manual trust level with
//! that history and then follows vouching edges, weighting each
//! recommendation by the recommender's own rank.

use std::collections::{HashMap, HashSet};

use crate::identity::TrustedIdentity;

const TRANSFER_WEIGHT: f64 = 0.2;
/// Volume bonus per GiB transferred.
const VOLUME_WEIGHT: f64 = 1.5;
const FAILURE_PENALTY: f64 = 1.0;
/// Average latencies above this threshold start costing score.
const LATENCY_THRESHOLD_MS: f64 = 300.0;
const LATENCY_PENALTY_PER_MS: f64 = 0.002;
/// Time constant of the exponential history decay, in days.
const DECAY_DAYS: f64 = 30.0;
/// Maximum bonus recommendations can add to an interaction score.
const RECOMMENDATION_BONUS: f64 = 2.0;
const SCORE_CAP: f64 = 5.0;
/// How many vouching hops `trust_rank` follows.
pub const DEFAULT_RANK_DEPTH: u32 = 2;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Advisory interaction score for one identity at wall-clock time
/// `now_millis`, clamped to `[-5, +5]`.
pub fn interaction_score(identity: &TrustedIdentity, now_millis: u64) -> f64 {
    let mut score = decayed_history(identity, now_millis);
    if !identity.recommendations.is_empty() {
        let sum: f64 = identity
            .recommendations
            .values()
            .map(|rec| f64::from(rec.trust_level))
            .sum();
        let avg = sum / identity.recommendations.len() as f64;
        score += (avg / 5.0) * RECOMMENDATION_BONUS;
    }
    score.clamp(-SCORE_CAP, SCORE_CAP)
}

/// Weighted interaction history with time decay applied, before the
/// recommendation bonus and before clamping.
fn decayed_history(identity: &TrustedIdentity, now_millis: u64) -> f64 {
    let mut score = identity.successful_transfers as f64 * TRANSFER_WEIGHT;
    score += identity.total_bytes_transferred as f64 / GIB * VOLUME_WEIGHT;
    score -= identity.failed_transfers as f64 * FAILURE_PENALTY;

    let avg_latency = identity.average_latency_ms();
    if avg_latency > LATENCY_THRESHOLD_MS {
        score -= (avg_latency - LATENCY_THRESHOLD_MS) * LATENCY_PENALTY_PER_MS;
    }

    if let Some(last) = identity.last_interaction_at {
        let days = now_millis.saturating_sub(last) as f64 / MILLIS_PER_DAY;
        score *= (-days / DECAY_DAYS).exp();
    }
    score
}

/// Recommendation-weighted trust rank of `fingerprint` over a store
/// snapshot: `rank = trust_level + interaction history
/// + Σ recommender_rank * (recommendation_level / 5)`, following
/// vouching edges up to [`DEFAULT_RANK_DEPTH`] hops. Unknown
/// fingerprints rank 0.
pub fn trust_rank(
    identities: &HashMap<String, TrustedIdentity>,
    fingerprint: &str,
    now_millis: u64,
) -> f64 {
    let mut cache = HashMap::new();
    rank_at_depth(
        identities,
        fingerprint,
        DEFAULT_RANK_DEPTH as i64,
        now_millis,
        &mut cache,
        &HashSet::new(),
    )
}

fn rank_at_depth(
    identities: &HashMap<String, TrustedIdentity>,
    fingerprint: &str,
    depth: i64,
    now_millis: u64,
    cache: &mut HashMap<String, f64>,
    visited: &HashSet<String>,
) -> f64 {
    if depth < 0 || visited.contains(fingerprint) {
        return 0.0;
    }
    if let Some(&score) = cache.get(fingerprint) {
        return score;
    }
    let Some(identity) = identities.get(fingerprint) else {
        return 0.0;
    };
    let mut visited = visited.clone();
    visited.insert(fingerprint.to_string());

    // Direct trust plus decayed history. The flat recommendation bonus
    // is left out here: vouching enters below, weighted by each
    // recommender's own rank.
    let mut score = f64::from(identity.trust_level);
    score += decayed_history(identity, now_millis).clamp(-SCORE_CAP, SCORE_CAP);

    for rec in identity.recommendations.values() {
        let recommender = rank_at_depth(
            identities,
            &rec.recommender_fingerprint,
            depth - 1,
            now_millis,
            cache,
            &visited,
        );
        if recommender > 0.0 {
            score += recommender * (f64::from(rec.trust_level) / 5.0);
        }
    }

    cache.insert(fingerprint.to_string(), score);
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Recommendation;

    const DAY_MS: u64 = 86_400_000;
    const EPS: f64 = 1e-9;

    fn peer(fingerprint: &str) -> TrustedIdentity {
        TrustedIdentity::new(format!("key-{fingerprint}"), fingerprint)
    }

    fn rec(from: &str, level: u8) -> Recommendation {
        Recommendation {
            recommender_fingerprint: from.into(),
            trust_level: level,
            note: None,
            issued_at: 0,
        }
    }

    fn snapshot(ids: Vec<TrustedIdentity>) -> HashMap<String, TrustedIdentity> {
        ids.into_iter()
            .map(|id| (id.fingerprint.clone(), id))
            .collect()
    }

    #[test]
    fn test_fresh_identity_scores_zero() {
        assert_eq!(interaction_score(&peer("p"), 0), 0.0);
    }

    #[test]
    fn test_transfer_volume_and_failure_weights() {
        let mut id = peer("p");
        id.successful_transfers = 10; // +2.0
        id.total_bytes_transferred = 2 * 1024 * 1024 * 1024; // +3.0
        id.failed_transfers = 3; // -3.0
        id.last_interaction_at = Some(1_000);
        assert!((interaction_score(&id, 1_000) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_slow_links_cost_score() {
        let mut id = peer("p");
        id.successful_transfers = 10; // +2.0
        id.sum_latency_ms = 800;
        id.latency_samples = 1; // 500 ms over threshold -> -1.0
        id.last_interaction_at = Some(0);
        assert!((interaction_score(&id, 0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_history_decays_over_time() {
        let mut id = peer("p");
        id.successful_transfers = 10; // +2.0 before decay
        id.last_interaction_at = Some(0);
        let one_time_constant_later = 30 * DAY_MS;
        let expected = 2.0 * (-1.0f64).exp();
        assert!((interaction_score(&id, one_time_constant_later) - expected).abs() < EPS);
    }

    #[test]
    fn test_score_is_clamped() {
        let mut busy = peer("busy");
        busy.successful_transfers = 1_000;
        busy.last_interaction_at = Some(0);
        assert_eq!(interaction_score(&busy, 0), 5.0);

        let mut flaky = peer("flaky");
        flaky.failed_transfers = 50;
        assert_eq!(interaction_score(&flaky, 0), -5.0);
    }

    #[test]
    fn test_recommendations_add_bounded_bonus() {
        let mut id = peer("p");
        id.add_recommendation(rec("alice", 5));
        assert!((interaction_score(&id, 0) - 2.0).abs() < EPS);

        id.add_recommendation(rec("bob", 1));
        // Average level 3 of a possible 5 earns 3/5 of the bonus.
        assert!((interaction_score(&id, 0) - 1.2).abs() < EPS);
    }

    #[test]
    fn test_rank_follows_recommendation_chain() {
        let mut alice = peer("alice");
        alice.trust_level = 5;
        let mut bob = peer("bob");
        bob.add_recommendation(rec("alice", 4));
        let mut charlie = peer("charlie");
        charlie.add_recommendation(rec("bob", 3));
        let ids = snapshot(vec![alice, bob, charlie]);

        assert!((trust_rank(&ids, "alice", 0) - 5.0).abs() < EPS);
        // 5.0 * 4/5
        assert!((trust_rank(&ids, "bob", 0) - 4.0).abs() < EPS);
        // 4.0 * 3/5
        assert!((trust_rank(&ids, "charlie", 0) - 2.4).abs() < EPS);
    }

    #[test]
    fn test_rank_ignores_non_positive_recommenders() {
        let mut mallory = peer("mallory");
        mallory.failed_transfers = 10;
        let mut bob = peer("bob");
        bob.add_recommendation(rec("mallory", 5));
        let ids = snapshot(vec![mallory, bob]);
        assert_eq!(trust_rank(&ids, "bob", 0), 0.0);
    }

    #[test]
    fn test_rank_survives_vouching_cycles() {
        let mut a = peer("a");
        a.trust_level = 3;
        a.add_recommendation(rec("b", 5));
        let mut b = peer("b");
        b.add_recommendation(rec("a", 5));
        let ids = snapshot(vec![a, b]);

        // a's direct trust flows to b exactly once; the back edge from
        // b to a is cut by cycle detection.
        assert!((trust_rank(&ids, "b", 0) - 3.0).abs() < EPS);
    }

    #[test]
    fn test_rank_is_depth_limited() {
        // d <- c <- b <- a: a's direct trust sits three hops out,
        // beyond the two-hop horizon.
        let mut a = peer("a");
        a.trust_level = 5;
        let mut b = peer("b");
        b.add_recommendation(rec("a", 5));
        let mut c = peer("c");
        c.add_recommendation(rec("b", 5));
        let mut d = peer("d");
        d.add_recommendation(rec("c", 5));
        let ids = snapshot(vec![a, b, c, d]);

        assert_eq!(trust_rank(&ids, "d", 0), 0.0);
    }

    #[test]
    fn test_rank_unknown_fingerprint_is_zero() {
        assert_eq!(trust_rank(&HashMap::new(), "ghost", 0), 0.0);
    }
}
