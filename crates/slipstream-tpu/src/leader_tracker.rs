use {
    crate::outcome::{SendOutcome, TpuSendError},
    log::{debug, warn},
    solana_clock::Slot,
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    std::{
        collections::HashMap,
        net::SocketAddr,
        str::FromStr,
        sync::{Arc, RwLock},
        time::{Duration, Instant},
    },
};

/// How long a cluster-node snapshot stays fresh before the next lookup
/// triggers a refetch.
const NODE_SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(300);

/// One upcoming leader the fan-out should target. The address is `None` when
/// the gossip snapshot has no TPU QUIC endpoint for the identity.
#[derive(Debug, Clone)]
pub struct LeaderTarget {
    pub identity: Pubkey,
    pub tpu_addr: Option<SocketAddr>,
}

#[derive(Default)]
struct ScheduleWindow {
    /// Absolute slot -> leader identity.
    by_slot: HashMap<Slot, Pubkey>,
    /// Inclusive slot range covered by `by_slot`. Zero-width when cold.
    first_slot: Slot,
    last_slot: Slot,
}

impl ScheduleWindow {
    fn covers(&self, slot: Slot) -> bool {
        self.last_slot > 0 && slot >= self.first_slot && slot <= self.last_slot
    }
}

struct NodeSnapshot {
    tpu_by_identity: HashMap<Pubkey, SocketAddr>,
    fetched_at: Instant,
}

/// Slot-to-leader schedule with TPU endpoint resolution, shared by every
/// in-flight submission of one client handle. Readers take the shared lock;
/// refreshes stage into a local map and swap under the exclusive lock.
pub struct LeaderTracker {
    rpc: Arc<RpcClient>,
    schedule: RwLock<ScheduleWindow>,
    nodes: RwLock<Option<NodeSnapshot>>,
}

impl LeaderTracker {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            schedule: RwLock::new(ScheduleWindow::default()),
            nodes: RwLock::new(None),
        }
    }

    /// Resolves the next `fanout` distinct leaders starting at `start_slot`.
    ///
    /// Walks consecutive slots until enough distinct identities accumulate;
    /// one validator leading several consecutive slots counts once. A cold or
    /// stale cache triggers a refresh first, and whatever resolves right now
    /// is returned — an empty window is the caller's `no-leaders` outcome,
    /// never an error.
    pub async fn next_leaders(&self, start_slot: Slot, fanout: usize) -> Vec<LeaderTarget> {
        if !self.schedule.read().unwrap().covers(start_slot) {
            if let Err(err) = self.refresh_schedule().await {
                warn!("leader schedule refresh failed: {err}");
            }
        }
        self.ensure_node_snapshot().await;

        let schedule = self.schedule.read().unwrap();
        let nodes = self.nodes.read().unwrap();
        let mut targets: Vec<LeaderTarget> = Vec::with_capacity(fanout);
        let mut slot = start_slot;
        // Bounded walk: past the cached range there is nothing left to find.
        while targets.len() < fanout && schedule.covers(slot) {
            if let Some(identity) = schedule.by_slot.get(&slot)
                && !targets.iter().any(|t| t.identity == *identity)
            {
                let tpu_addr = nodes
                    .as_ref()
                    .and_then(|snapshot| snapshot.tpu_by_identity.get(identity).copied());
                targets.push(LeaderTarget {
                    identity: *identity,
                    tpu_addr,
                });
            }
            slot += 1;
        }
        targets
    }

    /// Fetches the schedules for the current and next epoch and swaps them
    /// in.
    ///
    /// Slots already committed in the cached window are kept as-is; a
    /// committed slot assignment is never retroactively changed.
    pub async fn refresh_schedule(&self) -> Result<(), TpuSendError> {
        let epoch_info = self.rpc.get_epoch_info().await.map_err(|err| {
            TpuSendError::new(SendOutcome::Unreachable, format!("getEpochInfo: {err}"))
        })?;
        let epoch_start = epoch_info.absolute_slot - epoch_info.slot_index;

        let mut staged: HashMap<Slot, Pubkey> = HashMap::new();
        for first_slot in [epoch_start, epoch_start + epoch_info.slots_in_epoch] {
            let leader_schedule = match self.rpc.get_leader_schedule(Some(first_slot)).await {
                Ok(schedule) => schedule.unwrap_or_default(),
                Err(err) if first_slot == epoch_start => {
                    return Err(TpuSendError::new(
                        SendOutcome::Unreachable,
                        format!("getLeaderSchedule: {err}"),
                    ));
                }
                Err(err) => {
                    // The next epoch's schedule is best-effort.
                    debug!("next-epoch schedule unavailable: {err}");
                    continue;
                }
            };
            for (identity_str, slots) in leader_schedule.iter() {
                let Ok(identity) = Pubkey::from_str(identity_str) else {
                    debug!("skipping unparseable leader identity {identity_str}");
                    continue;
                };
                for slot_index in slots {
                    staged.insert(*slot_index as Slot + first_slot, identity);
                }
            }
        }

        if staged.is_empty() {
            return Ok(());
        }

        let mut schedule = self.schedule.write().unwrap();
        for (slot, identity) in schedule.by_slot.iter() {
            staged.entry(*slot).or_insert(*identity);
        }
        schedule.first_slot = staged.keys().min().copied().unwrap_or_default();
        schedule.last_slot = staged.keys().max().copied().unwrap_or_default();
        schedule.by_slot = staged;
        debug!(
            "leader schedule covers slots {}..={}",
            schedule.first_slot, schedule.last_slot
        );
        Ok(())
    }

    async fn ensure_node_snapshot(&self) {
        let fresh = self
            .nodes
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|snapshot| snapshot.fetched_at.elapsed() < NODE_SNAPSHOT_MAX_AGE);
        if fresh {
            return;
        }
        match self.rpc.get_cluster_nodes().await {
            Ok(contact_infos) => {
                let mut tpu_by_identity = HashMap::with_capacity(contact_infos.len());
                for info in contact_infos {
                    if let (Ok(identity), Some(addr)) =
                        (Pubkey::from_str(&info.pubkey), info.tpu_quic)
                    {
                        tpu_by_identity.insert(identity, addr);
                    }
                }
                debug!("cluster snapshot holds {} tpu endpoints", tpu_by_identity.len());
                *self.nodes.write().unwrap() = Some(NodeSnapshot {
                    tpu_by_identity,
                    fetched_at: Instant::now(),
                });
            }
            Err(err) => warn!("getClusterNodes failed, keeping stale snapshot: {err}"),
        }
    }

    /// Test/seed hook: installs a schedule window and endpoint map directly.
    pub fn seed(
        &self,
        by_slot: HashMap<Slot, Pubkey>,
        tpu_by_identity: HashMap<Pubkey, SocketAddr>,
    ) {
        let first = by_slot.keys().min().copied().unwrap_or_default();
        let last = by_slot.keys().max().copied().unwrap_or_default();
        *self.schedule.write().unwrap() = ScheduleWindow {
            by_slot,
            first_slot: first,
            last_slot: last,
        };
        *self.nodes.write().unwrap() = Some(NodeSnapshot {
            tpu_by_identity,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_tracker(slots: &[(Slot, Pubkey)]) -> LeaderTracker {
        let tracker = LeaderTracker::new(Arc::new(RpcClient::new(
            "http://localhost:8899".to_string(),
        )));
        let mut by_slot = HashMap::new();
        let mut nodes = HashMap::new();
        for (slot, identity) in slots {
            by_slot.insert(*slot, *identity);
            nodes.insert(*identity, "127.0.0.1:8003".parse().unwrap());
        }
        tracker.seed(by_slot, nodes);
        tracker
    }

    #[tokio::test]
    async fn test_consecutive_slots_for_one_leader_count_once() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let tracker = seeded_tracker(&[(10, a), (11, a), (12, a), (13, b)]);

        let targets = tracker.next_leaders(10, 2).await;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].identity, a);
        assert_eq!(targets[1].identity, b);
    }

    #[tokio::test]
    async fn test_window_smaller_than_fanout_returns_what_resolves() {
        let a = Pubkey::new_unique();
        let tracker = seeded_tracker(&[(5, a), (6, a)]);

        let targets = tracker.next_leaders(5, 4).await;
        assert_eq!(targets.len(), 1, "only one distinct identity is known");
    }

    #[tokio::test]
    async fn test_identity_without_tpu_endpoint_keeps_none_address() {
        let a = Pubkey::new_unique();
        let tracker = LeaderTracker::new(Arc::new(RpcClient::new(
            "http://localhost:8899".to_string(),
        )));
        tracker.seed(HashMap::from([(7, a)]), HashMap::new());

        let targets = tracker.next_leaders(7, 1).await;
        assert_eq!(targets.len(), 1);
        assert!(targets[0].tpu_addr.is_none());
    }
}
