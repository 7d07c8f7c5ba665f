use std::collections::BTreeMap;

use crate::model::{ClusterAssignment, PeerNode, ProcessId, ShardId};

/// Computes assignment of `[0, total)` across the current workers; stable
/// under churn.
pub struct ShardAssigner;

impl ShardAssigner {
    /// Sorts workers by `(join_timestamp, process_id)`, then distributes
    /// shards round-robin: worker at index `i` receives
    /// `{s : s mod len(workers) == i}`.
    ///
    /// `workers > total_shards` is not an error: excess workers simply
    /// receive an empty set. `workers.is_empty()` parks every shard.
    pub fn assign(workers: &[PeerNode], total: u32) -> ClusterAssignment {
        if workers.is_empty() {
            return ClusterAssignment::empty(total);
        }

        let mut ordered = workers.to_vec();
        ordered.sort_by(|a, b| {
            a.join_timestamp
                .cmp(&b.join_timestamp)
                .then_with(|| a.process_id.cmp(&b.process_id))
        });

        let mut map: BTreeMap<ProcessId, std::collections::BTreeSet<ShardId>> = ordered
            .iter()
            .map(|w| (w.process_id.clone(), std::collections::BTreeSet::new()))
            .collect();

        let n = ordered.len() as u32;
        for shard in 0..total {
            let owner = &ordered[(shard % n) as usize];
            map.get_mut(&owner.process_id).unwrap().insert(shard);
        }

        ClusterAssignment {
            total_shards: total,
            map,
            pending: std::collections::BTreeSet::new(),
        }
    }

    /// `true` when `new` differs from `current` in a way that warrants
    /// reassign messages: rebalance is only emitted on change (§4.4).
    pub fn differs(current: &ClusterAssignment, new: &ClusterAssignment) -> bool {
        current.map != new.map || current.pending != new.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use chrono::{Duration, Utc};

    fn worker_at(id: &str, offset_secs: i64) -> PeerNode {
        let mut p = PeerNode::new(id.to_string(), format!("http://{id}"), Role::Worker);
        p.join_timestamp = Utc::now() + Duration::seconds(offset_secs);
        p
    }

    #[test]
    fn s1_basic_assignment_round_robin_by_join_order() {
        let workers = vec![worker_at("A", 0), worker_at("B", 1), worker_at("C", 2)];
        let assignment = ShardAssigner::assign(&workers, 4);

        assert_eq!(assignment.shards_for("A"), [0, 3].into_iter().collect());
        assert_eq!(assignment.shards_for("B"), [1].into_iter().collect());
        assert_eq!(assignment.shards_for("C"), [2].into_iter().collect());
        assert!(assignment.is_partition());
    }

    #[test]
    fn s2_worker_leave_redistributes_among_survivors() {
        let workers = vec![worker_at("A", 0), worker_at("C", 2)];
        let assignment = ShardAssigner::assign(&workers, 4);

        assert_eq!(assignment.shards_for("A"), [0, 2].into_iter().collect());
        assert_eq!(assignment.shards_for("C"), [1, 3].into_iter().collect());
        assert!(assignment.is_partition());
    }

    #[test]
    fn zero_workers_parks_all_shards() {
        let assignment = ShardAssigner::assign(&[], 4);
        assert_eq!(assignment.pending.len(), 4);
        assert!(assignment.map.is_empty());
    }

    #[test]
    fn excess_workers_receive_empty_assignment_not_an_error() {
        let workers = vec![worker_at("A", 0), worker_at("B", 1), worker_at("C", 2)];
        let assignment = ShardAssigner::assign(&workers, 1);

        assert_eq!(assignment.shards_for("A"), [0].into_iter().collect());
        assert!(assignment.shards_for("B").is_empty());
        assert!(assignment.shards_for("C").is_empty());
    }

    #[test]
    fn unchanged_assignment_does_not_differ() {
        let workers = vec![worker_at("A", 0), worker_at("B", 1)];
        let first = ShardAssigner::assign(&workers, 4);
        let second = ShardAssigner::assign(&workers, 4);
        assert!(!ShardAssigner::differs(&first, &second));
    }

    #[test]
    fn register_deregister_register_round_trip_restores_assignment() {
        let a = worker_at("A", 0);
        let b = worker_at("B", 1);
        let initial = ShardAssigner::assign(&[a.clone(), b.clone()], 4);

        let after_leave = ShardAssigner::assign(&[a.clone()], 4);
        assert_ne!(initial.map, after_leave.map);

        let restored = ShardAssigner::assign(&[a, b], 4);
        assert_eq!(initial.map, restored.map);
    }
}
