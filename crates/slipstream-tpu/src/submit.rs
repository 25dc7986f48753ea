use {
    crate::{
        connection_pool::ConnectionPool,
        leader_tracker::{LeaderTarget, LeaderTracker},
        outcome::SendOutcome,
    },
    futures::future::join_all,
    log::debug,
    solana_clock::Slot,
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    std::{
        net::SocketAddr,
        sync::Arc,
        time::{Duration, Instant},
    },
    tokio_util::sync::CancellationToken,
};

/// Attempts per leader within one round: the first send plus up to two
/// retries for retryable outcomes.
const MAX_ATTEMPTS_PER_LEADER: u8 = 3;

#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Distinct upcoming leaders to target in this round.
    pub fanout: usize,
    /// Round deadline; each leader send inherits half of it.
    pub deadline: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            fanout: 8,
            deadline: Duration::from_millis(400),
        }
    }
}

/// What happened for one leader in one round.
#[derive(Debug, Clone)]
pub struct LeaderReport {
    pub identity: Pubkey,
    pub address: Option<SocketAddr>,
    pub outcome: SendOutcome,
    pub attempts: u8,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl LeaderReport {
    pub fn delivered(&self) -> bool {
        self.outcome == SendOutcome::Delivered
    }
}

/// Merged outcome of one submission round across all targeted leaders.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub leaders: Vec<LeaderReport>,
    pub no_leaders: bool,
}

impl RoundReport {
    pub fn delivered_count(&self) -> usize {
        self.leaders.iter().filter(|l| l.delivered()).count()
    }
}

/// Direct-to-leader QUIC submitter: resolves the upcoming leader window and
/// fans one transaction out to every distinct leader in it concurrently.
pub struct TpuClient {
    tracker: Arc<LeaderTracker>,
    pool: Arc<ConnectionPool>,
}

impl TpuClient {
    pub fn new(rpc: Arc<RpcClient>, identity: &Keypair) -> Result<Self, crate::TpuSendError> {
        Ok(Self {
            tracker: Arc::new(LeaderTracker::new(rpc)),
            pool: Arc::new(ConnectionPool::new(identity)?),
        })
    }

    pub fn tracker(&self) -> &Arc<LeaderTracker> {
        &self.tracker
    }

    /// Starts the background connection reaper; ends when `cancel` fires.
    pub fn start_reaper(&self, cancel: CancellationToken) {
        self.pool.spawn_reaper(cancel);
    }

    /// Sends `wire` to the next `fanout` distinct leaders from `start_slot`.
    ///
    /// Per-leader sends run concurrently and unordered; the report is merged
    /// once every leader settles or its deadline fires. An empty leader
    /// window yields `no_leaders`, not an error.
    pub async fn submit(
        &self,
        wire: &[u8],
        start_slot: Slot,
        options: &SubmitOptions,
    ) -> RoundReport {
        let targets = self.tracker.next_leaders(start_slot, options.fanout).await;
        if targets.is_empty() {
            debug!("no leaders resolved from slot {start_slot}");
            return RoundReport {
                leaders: Vec::new(),
                no_leaders: true,
            };
        }

        let per_leader_deadline = options.deadline / 2;
        let sends = targets
            .iter()
            .map(|target| self.send_to_leader(target, wire, per_leader_deadline));
        let leaders = join_all(sends).await;

        RoundReport {
            leaders,
            no_leaders: false,
        }
    }

    async fn send_to_leader(
        &self,
        target: &LeaderTarget,
        wire: &[u8],
        deadline: Duration,
    ) -> LeaderReport {
        let started = Instant::now();
        let Some(addr) = target.tpu_addr else {
            return LeaderReport {
                identity: target.identity,
                address: None,
                outcome: SendOutcome::Unreachable,
                attempts: 0,
                latency_ms: 0,
                error: Some("no tpu endpoint in cluster snapshot".to_string()),
            };
        };

        let mut attempts: u8 = 0;
        let mut last_error = None;
        let outcome = loop {
            attempts += 1;
            match self.pool.send_to(addr, wire, deadline).await {
                Ok(()) => break SendOutcome::Delivered,
                Err(err) => {
                    let code = err.code;
                    last_error = Some(err.message);
                    if !code.is_retryable() || attempts >= MAX_ATTEMPTS_PER_LEADER {
                        break code;
                    }
                    // Stop retrying once the deadline has no budget left.
                    if started.elapsed() >= deadline {
                        break SendOutcome::Timeout;
                    }
                }
            }
        };

        LeaderReport {
            identity: target.identity,
            address: Some(addr),
            outcome,
            attempts,
            latency_ms: started.elapsed().as_millis() as u64,
            error: (outcome != SendOutcome::Delivered)
                .then_some(last_error)
                .flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_cover_one_slot() {
        let options = SubmitOptions::default();
        assert_eq!(options.deadline, Duration::from_millis(400));
        assert!(options.fanout >= 6, "default fanout targets a wide window");
    }

    #[test]
    fn test_round_report_counts_only_delivered() {
        let identity = Pubkey::new_unique();
        let report = RoundReport {
            leaders: vec![
                LeaderReport {
                    identity,
                    address: None,
                    outcome: SendOutcome::Delivered,
                    attempts: 1,
                    latency_ms: 3,
                    error: None,
                },
                LeaderReport {
                    identity: Pubkey::new_unique(),
                    address: None,
                    outcome: SendOutcome::Timeout,
                    attempts: 3,
                    latency_ms: 200,
                    error: Some("deadline elapsed".to_string()),
                },
            ],
            no_leaders: false,
        };
        assert_eq!(report.delivered_count(), 1);
    }
}
