/// Submission-side tests: round-log invariants, the HTTP route response
/// mapping, and the event surface.
use {
    slipstream::{
        ConfirmationChannel, EventBus, PipelineEvent, SubmissionResult, SubmissionRound,
        TpuSubmitResponse,
    },
    slipstream_tpu::{LeaderReport, RoundReport, SendOutcome},
    solana_pubkey::Pubkey,
    solana_signature::Signature,
};

fn leader(outcome: SendOutcome, attempts: u8) -> LeaderReport {
    LeaderReport {
        identity: Pubkey::new_unique(),
        address: Some("127.0.0.1:8003".parse().unwrap()),
        outcome,
        attempts,
        latency_ms: 21,
        error: (outcome != SendOutcome::Delivered).then(|| "send failed".to_string()),
    }
}

fn result_with_rounds(rounds: Vec<SubmissionRound>) -> SubmissionResult {
    let total = rounds.iter().map(|round| round.leaders.len() as u64).sum();
    SubmissionResult {
        confirmed: true,
        signature: Signature::default(),
        rounds: rounds.len() as u64,
        total_leaders_contacted: total,
        total_latency_ms: 640,
        round_log: rounds,
        channel: Some(ConfirmationChannel::Subscription),
        error: None,
    }
}

#[test]
fn test_leaders_contacted_bounded_by_fanout_times_rounds() {
    let fanout = 4;
    let rounds: Vec<SubmissionRound> = (1..=3)
        .map(|index| {
            SubmissionRound::from_report(
                index,
                (index - 1) * 400,
                RoundReport {
                    leaders: (0..fanout)
                        .map(|_| leader(SendOutcome::Delivered, 1))
                        .collect(),
                    no_leaders: false,
                },
            )
        })
        .collect();
    let result = result_with_rounds(rounds);

    assert!(result.rounds >= 1);
    assert!(result.total_leaders_contacted <= fanout as u64 * result.rounds);
}

#[test]
fn test_no_leaders_round_keeps_log_sequential() {
    let rounds = vec![
        SubmissionRound::from_report(
            1,
            0,
            RoundReport {
                leaders: vec![],
                no_leaders: true,
            },
        ),
        SubmissionRound::from_report(
            2,
            400,
            RoundReport {
                leaders: vec![],
                no_leaders: true,
            },
        ),
    ];
    for (position, round) in rounds.iter().enumerate() {
        assert_eq!(round.index, position as u64 + 1);
        assert!(round.no_leaders);
        assert_eq!(round.delivered_count(), 0);
    }
}

#[test]
fn test_http_response_flattens_leader_reports() {
    let round = SubmissionRound::from_report(
        1,
        0,
        RoundReport {
            leaders: vec![
                leader(SendOutcome::Delivered, 1),
                leader(SendOutcome::RateLimited, 3),
            ],
            no_leaders: false,
        },
    );
    let result = result_with_rounds(vec![round]);
    let response = TpuSubmitResponse::from_result(&result);

    assert!(response.delivered);
    assert_eq!(response.leader_count, 2);
    // Two extra attempts against the rate-limited leader.
    assert_eq!(response.retry_count, 2);

    let json = serde_json::to_value(&response).unwrap();
    let entries = json["leaders"].as_array().unwrap();
    assert_eq!(entries[0]["success"], true);
    assert!(entries[0].get("errorCode").is_none());
    assert_eq!(entries[1]["success"], false);
    assert_eq!(entries[1]["errorCode"], "rate-limited");
}

#[tokio::test]
async fn test_event_bus_carries_result_payload() {
    let bus = EventBus::default();
    let mut receiver = bus.subscribe();

    bus.emit(PipelineEvent::TpuStart);
    bus.emit(PipelineEvent::TpuResult(result_with_rounds(vec![
        SubmissionRound::without_leaders(1, 0),
    ])));

    assert!(matches!(
        receiver.recv().await.unwrap(),
        PipelineEvent::TpuStart
    ));
    match receiver.recv().await.unwrap() {
        PipelineEvent::TpuResult(result) => {
            assert!(result.confirmed);
            assert_eq!(result.rounds, 1);
        }
        other => panic!("expected TpuResult, got {}", other.name()),
    }
}
