use {serde::Serialize, std::fmt, thiserror::Error};

/// Terminal classification of one send attempt against one leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendOutcome {
    /// Stream opened, write completed, peer acknowledged the finish.
    Delivered,
    /// QUIC handshake failed.
    ConnectionFailed,
    /// Peer abruptly closed the stream before finish.
    StreamClosed,
    /// Explicit limit frame, or repeated stream rejections on one connection.
    RateLimited,
    /// Deadline elapsed mid-operation.
    Timeout,
    /// Gossip/DNS resolution produced no TPU address for the identity.
    Unreachable,
    /// Server refused early data and the 1-RTT fallback also failed.
    ZeroRttRejected,
    /// The leader window resolved to no identities at all.
    NoLeaders,
}

impl SendOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            SendOutcome::Delivered => "delivered",
            SendOutcome::ConnectionFailed => "connection-failed",
            SendOutcome::StreamClosed => "stream-closed",
            SendOutcome::RateLimited => "rate-limited",
            SendOutcome::Timeout => "timeout",
            SendOutcome::Unreachable => "unreachable",
            SendOutcome::ZeroRttRejected => "zero-rtt-rejected",
            SendOutcome::NoLeaders => "no-leaders",
        }
    }

    /// Outcomes worth another in-round attempt against the same leader.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SendOutcome::ConnectionFailed
                | SendOutcome::StreamClosed
                | SendOutcome::RateLimited
                | SendOutcome::Timeout
        )
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
#[error("tpu send failed ({}): {message}", code.code())]
pub struct TpuSendError {
    pub code: SendOutcome,
    pub message: String,
}

impl TpuSendError {
    pub fn new(code: SendOutcome, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
