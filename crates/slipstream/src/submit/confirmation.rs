use {
    crate::{constants::SLOT_DURATION, types::ConfirmationChannel},
    futures::StreamExt,
    log::{debug, warn},
    solana_clock::Slot,
    solana_commitment_config::CommitmentConfig,
    solana_pubsub_client::nonblocking::pubsub_client::PubsubClient,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_rpc_client_api::{config::RpcSignatureSubscribeConfig, response::RpcSignatureResult},
    solana_signature::Signature,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
};

/// Gap-filling poll cadence when the subscription is quiet or absent.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(800);

/// First-arrival confirmation observed on any channel.
#[derive(Debug, Clone)]
pub struct ConfirmationSignal {
    pub signature: Signature,
    pub channel: ConfirmationChannel,
    pub slot: Option<Slot>,
    /// On-chain error, when the transaction landed but failed.
    pub err: Option<String>,
}

/// Shared setter; whichever channel signals first wins, later signals drop.
#[derive(Clone)]
pub struct ConfirmationHandle {
    sender: Arc<watch::Sender<Option<ConfirmationSignal>>>,
}

impl ConfirmationHandle {
    pub fn signal(&self, signal: ConfirmationSignal) {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal.clone());
            true
        });
    }
}

/// Watches one signature across the subscription channel and a
/// `getSignatureStatuses` poll, racing them to the first confirmation.
/// The subscription is preferred when available but never assumed.
pub struct ConfirmationWatcher {
    receiver: watch::Receiver<Option<ConfirmationSignal>>,
    handle: ConfirmationHandle,
}

impl ConfirmationWatcher {
    pub fn spawn(
        rpc: Arc<RpcClient>,
        pubsub: Option<Arc<PubsubClient>>,
        signature: Signature,
        commitment: CommitmentConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = watch::channel(None);
        let handle = ConfirmationHandle {
            sender: Arc::new(sender),
        };

        if let Some(pubsub) = pubsub {
            let subscription_handle = handle.clone();
            let subscription_cancel = cancel.clone();
            tokio::spawn(async move {
                watch_subscription(
                    pubsub,
                    signature,
                    commitment,
                    subscription_handle,
                    subscription_cancel,
                )
                .await;
            });
        }

        let poll_handle = handle.clone();
        tokio::spawn(async move {
            poll_statuses(rpc, signature, commitment, poll_handle, cancel).await;
        });

        Self { receiver, handle }
    }

    /// Handle for out-of-band channels (the block-engine poller).
    pub fn handle(&self) -> ConfirmationHandle {
        self.handle.clone()
    }

    /// Resolves with the winning signal; pends forever if none arrives, so
    /// callers always race it against their own deadline.
    pub async fn confirmed(&mut self) -> ConfirmationSignal {
        loop {
            if let Some(signal) = self.receiver.borrow().clone() {
                return signal;
            }
            if self.receiver.changed().await.is_err() {
                // Sender kept alive by the handle; closing means shutdown.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Non-blocking peek at the current state.
    pub fn current(&self) -> Option<ConfirmationSignal> {
        self.receiver.borrow().clone()
    }
}

async fn watch_subscription(
    pubsub: Arc<PubsubClient>,
    signature: Signature,
    commitment: CommitmentConfig,
    handle: ConfirmationHandle,
    cancel: CancellationToken,
) {
    let config = RpcSignatureSubscribeConfig {
        commitment: Some(commitment),
        ..RpcSignatureSubscribeConfig::default()
    };
    let subscription = pubsub.signature_subscribe(&signature, Some(config)).await;
    let (mut stream, _unsubscribe) = match subscription {
        Ok(subscription) => subscription,
        Err(err) => {
            // The poll channel fills the gap.
            warn!("signature subscription unavailable: {err}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            response = stream.next() => {
                let Some(response) = response else { return };
                if let RpcSignatureResult::ProcessedSignature(processed) = response.value {
                    debug!("subscription confirmed {signature} at slot {}", response.context.slot);
                    handle.signal(ConfirmationSignal {
                        signature,
                        channel: ConfirmationChannel::Subscription,
                        slot: Some(response.context.slot),
                        err: processed.err.map(|err| err.to_string()),
                    });
                    return;
                }
            }
        }
    }
}

async fn poll_statuses(
    rpc: Arc<RpcClient>,
    signature: Signature,
    commitment: CommitmentConfig,
    handle: ConfirmationHandle,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match rpc.get_signature_statuses(&[signature]).await {
            Ok(response) => {
                let Some(Some(status)) = response.value.into_iter().next() else {
                    continue;
                };
                if status.satisfies_commitment(commitment) {
                    debug!("status poll confirmed {signature} at slot {}", status.slot);
                    handle.signal(ConfirmationSignal {
                        signature,
                        channel: ConfirmationChannel::RpcPoll,
                        slot: Some(status.slot),
                        err: status.err.map(|err| err.to_string()),
                    });
                    return;
                }
            }
            Err(err) => debug!("getSignatureStatuses failed: {err}"),
        }
    }
}

/// Current-slot tracker: slot subscription when available, `getSlot` poll
/// at slot cadence otherwise.
pub struct SlotClock {
    receiver: watch::Receiver<Slot>,
}

impl SlotClock {
    pub fn spawn(
        rpc: Arc<RpcClient>,
        pubsub: Option<Arc<PubsubClient>>,
        initial_slot: Slot,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = watch::channel(initial_slot);

        tokio::spawn(async move {
            if let Some(pubsub) = pubsub {
                if watch_slots(pubsub, &sender, &cancel).await {
                    return;
                }
                // Subscription never came up; degrade to polling.
            }
            poll_slots(rpc, &sender, &cancel).await;
        });

        Self { receiver }
    }

    pub fn current(&self) -> Slot {
        *self.receiver.borrow()
    }

    /// Resolves at the next observed slot advance.
    pub async fn next_slot(&mut self) -> Slot {
        let _ = self.receiver.changed().await;
        *self.receiver.borrow()
    }
}

async fn watch_slots(
    pubsub: Arc<PubsubClient>,
    sender: &watch::Sender<Slot>,
    cancel: &CancellationToken,
) -> bool {
    let subscription = pubsub.slot_subscribe().await;
    let (mut stream, _unsubscribe) = match subscription {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!("slot subscription unavailable: {err}");
            return false;
        }
    };
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return true,
            info = stream.next() => {
                let Some(info) = info else { return true };
                let _ = sender.send(info.slot);
            }
        }
    }
}

async fn poll_slots(rpc: Arc<RpcClient>, sender: &watch::Sender<Slot>, cancel: &CancellationToken) {
    let mut ticker = tokio::time::interval(SLOT_DURATION);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if let Ok(slot) = rpc.get_slot().await {
            let _ = sender.send(slot);
        }
    }
}
