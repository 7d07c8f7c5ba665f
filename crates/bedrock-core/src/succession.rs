use std::time::Duration;

use crate::model::{PeerNode, SuccessionEntry, SuccessionOrder};

/// Deterministic ordering of workers for coordinator failover.
pub struct SuccessionEngine;

impl SuccessionEngine {
    /// Sorts by `(join_timestamp ascending, process_id ascending)`,
    /// excluding the coordinator itself; ranks are dense `0..k-1`.
    pub fn compute_order(workers: &[PeerNode]) -> SuccessionOrder {
        let mut ordered = workers.to_vec();
        ordered.sort_by(|a, b| {
            a.join_timestamp
                .cmp(&b.join_timestamp)
                .then_with(|| a.process_id.cmp(&b.process_id))
        });

        let entries = ordered
            .into_iter()
            .enumerate()
            .map(|(rank, peer)| SuccessionEntry {
                process_id: peer.process_id,
                url: peer.url,
                rank: rank as u32,
            })
            .collect();

        SuccessionOrder(entries)
    }

    /// `succession_timeout = 10s * rank` (§4.8): the delay a candidate
    /// waits before re-evaluating promotion, allowing lower-ranked
    /// candidates first refusal.
    pub fn promotion_delay(rank: u32) -> Duration {
        Duration::from_secs(10 * rank as u64)
    }

    /// Split-brain tie-break (§4.8, S6): higher epoch wins; equal epoch is
    /// broken by lower `process_id`.
    pub fn winning_promotion<'a>(
        a: (u64, &'a str),
        b: (u64, &'a str),
    ) -> &'a str {
        let (epoch_a, id_a) = a;
        let (epoch_b, id_b) = b;
        match epoch_a.cmp(&epoch_b) {
            std::cmp::Ordering::Greater => id_a,
            std::cmp::Ordering::Less => id_b,
            std::cmp::Ordering::Equal => std::cmp::min(id_a, id_b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PeerNode, Role};
    use chrono::{Duration as ChronoDuration, Utc};

    fn worker_at(id: &str, offset_secs: i64) -> PeerNode {
        let mut p = PeerNode::new(id.to_string(), format!("http://{id}"), Role::Worker);
        p.join_timestamp = Utc::now() + ChronoDuration::seconds(offset_secs);
        p
    }

    #[test]
    fn s3_order_is_dense_and_coordinator_excluded() {
        let workers = vec![worker_at("A", 0), worker_at("B", 1), worker_at("C", 2)];
        let order = SuccessionEngine::compute_order(&workers);

        assert!(order.is_dense());
        assert_eq!(order.rank_of("A"), Some(0));
        assert_eq!(order.rank_of("B"), Some(1));
        assert_eq!(order.rank_of("C"), Some(2));
    }

    #[test]
    fn rank_zero_promotes_immediately_others_wait_in_order() {
        assert_eq!(SuccessionEngine::promotion_delay(0), Duration::ZERO);
        assert_eq!(SuccessionEngine::promotion_delay(1), Duration::from_secs(10));
        assert_eq!(SuccessionEngine::promotion_delay(2), Duration::from_secs(20));
    }

    #[test]
    fn s6_split_vote_resolved_by_epoch_then_process_id() {
        assert_eq!(
            SuccessionEngine::winning_promotion((5, "B"), (4, "A")),
            "B"
        );
        assert_eq!(
            SuccessionEngine::winning_promotion((5, "B"), (5, "A")),
            "A"
        );
    }
}
