use {
    crate::submit::jito::JitoRegion,
    slipstream_tpu::{LeaderReport, RoundReport, SendOutcome},
    solana_signature::Signature,
    std::{fmt, str::FromStr},
};

/// Submission path selection. The execute-config node picks one per
/// `execute`; it never touches the builder's fee configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStrategy {
    /// Conventional RPC submission only.
    #[default]
    Standard,
    /// Jito bundle only.
    Economical,
    /// Jito bundle racing RPC fan-out.
    Fast,
    /// Direct TPU + RPC racing with continuous resubmission.
    Ultra,
}

impl SubmissionStrategy {
    pub fn uses_tpu(&self) -> bool {
        matches!(self, SubmissionStrategy::Ultra)
    }

    pub fn uses_rpc(&self) -> bool {
        matches!(
            self,
            SubmissionStrategy::Standard | SubmissionStrategy::Fast | SubmissionStrategy::Ultra
        )
    }

    pub fn uses_bundle(&self) -> bool {
        matches!(self, SubmissionStrategy::Economical | SubmissionStrategy::Fast)
    }
}

impl fmt::Display for SubmissionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmissionStrategy::Standard => "standard",
            SubmissionStrategy::Economical => "economical",
            SubmissionStrategy::Fast => "fast",
            SubmissionStrategy::Ultra => "ultra",
        })
    }
}

impl FromStr for SubmissionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(SubmissionStrategy::Standard),
            "economical" => Ok(SubmissionStrategy::Economical),
            "fast" => Ok(SubmissionStrategy::Fast),
            "ultra" => Ok(SubmissionStrategy::Ultra),
            other => Err(anyhow::anyhow!("unknown strategy '{other}'")),
        }
    }
}

/// Execute-config output: the strategy plus its tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionProfile {
    pub strategy: SubmissionStrategy,
    /// Distinct leaders per TPU round.
    pub fanout: usize,
    pub region: JitoRegion,
    pub tip_lamports: u64,
}

impl Default for ExecutionProfile {
    fn default() -> Self {
        Self {
            strategy: SubmissionStrategy::Standard,
            fanout: 8,
            region: JitoRegion::Mainnet,
            tip_lamports: 10_000,
        }
    }
}

/// Where the winning confirmation was first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationChannel {
    Subscription,
    RpcPoll,
    BlockEngine,
}

impl fmt::Display for ConfirmationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfirmationChannel::Subscription => "subscription",
            ConfirmationChannel::RpcPoll => "rpc-poll",
            ConfirmationChannel::BlockEngine => "block-engine",
        })
    }
}

/// One entry of the append-only round log kept during a single `execute`.
#[derive(Debug, Clone)]
pub struct SubmissionRound {
    /// 1-based round number.
    pub index: u64,
    /// Milliseconds since the `execute` started when this round fired.
    pub sent_at_ms: u64,
    pub leaders: Vec<LeaderReport>,
    pub no_leaders: bool,
}

impl SubmissionRound {
    pub fn from_report(index: u64, sent_at_ms: u64, report: RoundReport) -> Self {
        Self {
            index,
            sent_at_ms,
            leaders: report.leaders,
            no_leaders: report.no_leaders,
        }
    }

    /// Round with no TPU activity (RPC-only strategies still log rounds).
    pub fn without_leaders(index: u64, sent_at_ms: u64) -> Self {
        Self {
            index,
            sent_at_ms,
            leaders: Vec::new(),
            no_leaders: false,
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.leaders
            .iter()
            .filter(|leader| leader.outcome == SendOutcome::Delivered)
            .count()
    }
}

/// Terminal report of one `execute`; produced exactly once.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub confirmed: bool,
    pub signature: Signature,
    pub rounds: u64,
    pub total_leaders_contacted: u64,
    pub total_latency_ms: u64,
    pub round_log: Vec<SubmissionRound>,
    pub channel: Option<ConfirmationChannel>,
    pub error: Option<String>,
}

impl SubmissionResult {
    pub fn delivered(&self) -> bool {
        self.round_log
            .iter()
            .any(|round| round.delivered_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_channel_matrix() {
        // standard: rpc only / economical: bundle only / fast: bundle + rpc /
        // ultra: tpu + rpc.
        assert!(SubmissionStrategy::Standard.uses_rpc());
        assert!(!SubmissionStrategy::Standard.uses_bundle());
        assert!(!SubmissionStrategy::Standard.uses_tpu());

        assert!(SubmissionStrategy::Economical.uses_bundle());
        assert!(!SubmissionStrategy::Economical.uses_rpc());

        assert!(SubmissionStrategy::Fast.uses_bundle());
        assert!(SubmissionStrategy::Fast.uses_rpc());
        assert!(!SubmissionStrategy::Fast.uses_tpu());

        assert!(SubmissionStrategy::Ultra.uses_tpu());
        assert!(SubmissionStrategy::Ultra.uses_rpc());
        assert!(!SubmissionStrategy::Ultra.uses_bundle());
    }

    #[test]
    fn test_strategy_parses_all_names() {
        for name in ["standard", "economical", "fast", "ultra"] {
            let strategy: SubmissionStrategy = name.parse().unwrap();
            assert_eq!(strategy.to_string(), name);
        }
        assert!("warp".parse::<SubmissionStrategy>().is_err());
    }

    #[test]
    fn test_default_profile_fanout_wide_enough_for_ultra() {
        let profile = ExecutionProfile::default();
        assert!(profile.fanout >= 6);
    }

    #[test]
    fn test_round_log_invariants() {
        let rounds = vec![
            SubmissionRound::without_leaders(1, 0),
            SubmissionRound::without_leaders(2, 400),
        ];
        let result = SubmissionResult {
            confirmed: true,
            signature: Signature::default(),
            rounds: rounds.len() as u64,
            total_leaders_contacted: 0,
            total_latency_ms: 800,
            round_log: rounds,
            channel: Some(ConfirmationChannel::RpcPoll),
            error: None,
        };
        assert!(result.rounds >= 1);
        // Round indexes are strictly sequential from 1.
        for (position, round) in result.round_log.iter().enumerate() {
            assert_eq!(round.index, position as u64 + 1);
        }
    }
}
