use {crate::types::SubmissionResult, tokio::sync::broadcast};

/// Observer-channel equivalent of the browser's window-global events.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Fired once per `execute`, at the round-1 send.
    TpuStart,
    /// Fired once per `execute`, with the terminal result.
    TpuResult(SubmissionResult),
}

impl PipelineEvent {
    /// Stable event name, mirroring the browser-side channel naming.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::TpuStart => "slipstream:tpu:start",
            PipelineEvent::TpuResult(_) => "slipstream:tpu:result",
        }
    }
}

/// Broadcast fan-out to any number of observers; emitting with nobody
/// listening is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: PipelineEvent) {
        // No receivers is not an error; the UI may not be attached.
        let _ = self.sender.send(event);
    }
}
