use {
    crate::outcome::{SendOutcome, TpuSendError},
    log::debug,
    lru::LruCache,
    quinn::{
        ClientConfig, Connection, Endpoint, IdleTimeout, TransportConfig,
        crypto::rustls::QuicClientConfig,
    },
    solana_keypair::Keypair,
    solana_tls_utils::{new_dummy_x509_certificate, tls_client_config_builder},
    std::{
        net::{Ipv4Addr, SocketAddr},
        num::NonZeroUsize,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    },
    tokio::{task::JoinHandle, time::timeout},
    tokio_util::sync::CancellationToken,
};

/// ALPN the validator TPU ingress negotiates.
const ALPN_TPU_PROTOCOL_ID: &[u8] = b"solana-tpu";

/// SNI placeholder the agave quic stack expects from clients.
const QUIC_SERVER_NAME: &str = "connect";

/// A pooled connection older than this is reaped and redialed on next use.
pub const MAX_IDLE_AGE: Duration = Duration::from_secs(30);

const COOLDOWN_FLOOR: Duration = Duration::from_secs(1);
const COOLDOWN_CEILING: Duration = Duration::from_secs(16);

/// Stream rejections on one connection before it is treated as throttled.
const REJECTIONS_BEFORE_RATE_LIMIT: u32 = 2;

/// Bound on concurrent uni streams per connection, below validator limits.
const MAX_STREAMS_PER_CONNECTION: usize = 8;

const POOL_CAPACITY: usize = 64;

struct PeerConn {
    connection: Option<Connection>,
    last_used: Instant,
    /// A prior completed handshake makes 0-RTT worth attempting on redial.
    had_session: bool,
    cooldown_until: Option<Instant>,
    cooldown: Duration,
    stream_rejections: u32,
}

/// Per-endpoint state. The async mutex serializes dialing and connection
/// replacement for one endpoint; the semaphore bounds in-flight streams.
pub struct PeerState {
    addr: SocketAddr,
    conn: tokio::sync::Mutex<PeerConn>,
    streams: tokio::sync::Semaphore,
}

/// Client-side QUIC connection pool keyed by TPU endpoint address.
///
/// The outer map lock is held only for lookups and insertions; all dialing
/// and sending happens under the per-endpoint lock.
pub struct ConnectionPool {
    endpoint: Endpoint,
    peers: Mutex<LruCache<SocketAddr, Arc<PeerState>>>,
}

impl ConnectionPool {
    /// Builds a client endpoint authenticated with a throwaway certificate
    /// derived from `identity`, skipping server certificate verification the
    /// way every agave QUIC client does.
    pub fn new(identity: &Keypair) -> Result<Self, TpuSendError> {
        let (certificate, key) = new_dummy_x509_certificate(identity);
        let mut crypto = tls_client_config_builder()
            .with_client_auth_cert(vec![certificate], key)
            .map_err(|err| {
                TpuSendError::new(SendOutcome::ConnectionFailed, format!("client tls: {err}"))
            })?;
        crypto.enable_early_data = true;
        crypto.alpn_protocols = vec![ALPN_TPU_PROTOCOL_ID.to_vec()];

        let mut endpoint = Endpoint::client(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .map_err(|err| {
                TpuSendError::new(SendOutcome::ConnectionFailed, format!("bind: {err}"))
            })?;

        let mut transport = TransportConfig::default();
        let idle = IdleTimeout::try_from(MAX_IDLE_AGE).map_err(|err| {
            TpuSendError::new(SendOutcome::ConnectionFailed, format!("idle timeout: {err}"))
        })?;
        transport.max_idle_timeout(Some(idle));
        transport.keep_alive_interval(Some(Duration::from_secs(4)));

        let quic_config = QuicClientConfig::try_from(crypto).map_err(|err| {
            TpuSendError::new(SendOutcome::ConnectionFailed, format!("quic tls: {err}"))
        })?;
        let mut client_config = ClientConfig::new(Arc::new(quic_config));
        client_config.transport_config(Arc::new(transport));
        endpoint.set_default_client_config(client_config);

        Ok(Self {
            endpoint,
            peers: Mutex::new(LruCache::new(
                NonZeroUsize::new(POOL_CAPACITY).expect("nonzero pool capacity"),
            )),
        })
    }

    fn peer(&self, addr: SocketAddr) -> Arc<PeerState> {
        let mut peers = self.peers.lock().unwrap();
        peers
            .get_or_insert(addr, || {
                Arc::new(PeerState {
                    addr,
                    conn: tokio::sync::Mutex::new(PeerConn {
                        connection: None,
                        last_used: Instant::now(),
                        had_session: false,
                        cooldown_until: None,
                        cooldown: COOLDOWN_FLOOR,
                        stream_rejections: 0,
                    }),
                    streams: tokio::sync::Semaphore::new(MAX_STREAMS_PER_CONNECTION),
                })
            })
            .clone()
    }

    /// Sends one wire-encoded transaction to `addr` on a fresh uni stream,
    /// bounded by `deadline` end to end. Ok(()) means the peer acknowledged
    /// the stream finish.
    pub async fn send_to(
        &self,
        addr: SocketAddr,
        wire: &[u8],
        deadline: Duration,
    ) -> Result<(), TpuSendError> {
        let peer = self.peer(addr);
        match timeout(deadline, self.send_on_peer(&peer, wire)).await {
            Ok(result) => result,
            Err(_) => Err(TpuSendError::new(
                SendOutcome::Timeout,
                format!("deadline {deadline:?} elapsed sending to {addr}"),
            )),
        }
    }

    async fn send_on_peer(&self, peer: &PeerState, wire: &[u8]) -> Result<(), TpuSendError> {
        let _stream_permit = peer.streams.acquire().await.map_err(|_| {
            TpuSendError::new(SendOutcome::ConnectionFailed, "pool shutting down")
        })?;

        let mut conn = peer.conn.lock().await;
        if let Some(until) = conn.cooldown_until {
            if Instant::now() < until {
                return Err(TpuSendError::new(
                    SendOutcome::RateLimited,
                    format!("{} cooling down for {:?}", peer.addr, until - Instant::now()),
                ));
            }
            conn.cooldown_until = None;
        }

        let connection = match conn.connection.clone() {
            Some(existing) if existing.close_reason().is_none() => existing,
            _ => {
                let attempt_zero_rtt = conn.had_session;
                let dialed = self.dial(peer.addr, attempt_zero_rtt).await?;
                conn.connection = Some(dialed.clone());
                conn.had_session = true;
                dialed
            }
        };
        conn.last_used = Instant::now();

        match Self::write_transaction(&connection, wire).await {
            Ok(()) => {
                conn.stream_rejections = 0;
                conn.cooldown = COOLDOWN_FLOOR;
                Ok(())
            }
            Err(err) if err.code == SendOutcome::StreamClosed => {
                conn.stream_rejections += 1;
                if conn.stream_rejections >= REJECTIONS_BEFORE_RATE_LIMIT {
                    let cooldown = conn.cooldown;
                    conn.cooldown_until = Some(Instant::now() + cooldown);
                    conn.cooldown = (conn.cooldown * 2).min(COOLDOWN_CEILING);
                    conn.stream_rejections = 0;
                    Err(TpuSendError::new(
                        SendOutcome::RateLimited,
                        format!("{}: repeated stream rejections", peer.addr),
                    ))
                } else {
                    Err(err)
                }
            }
            Err(err) => {
                // Anything below stream level invalidates the connection.
                if matches!(
                    err.code,
                    SendOutcome::ConnectionFailed | SendOutcome::Timeout
                ) {
                    conn.connection = None;
                }
                if err.code == SendOutcome::RateLimited {
                    let cooldown = conn.cooldown;
                    conn.cooldown_until = Some(Instant::now() + cooldown);
                    conn.cooldown = (conn.cooldown * 2).min(COOLDOWN_CEILING);
                }
                Err(err)
            }
        }
    }

    async fn dial(
        &self,
        addr: SocketAddr,
        attempt_zero_rtt: bool,
    ) -> Result<Connection, TpuSendError> {
        let connecting = self
            .endpoint
            .connect(addr, QUIC_SERVER_NAME)
            .map_err(|err| {
                TpuSendError::new(SendOutcome::ConnectionFailed, format!("connect: {err}"))
            })?;

        if attempt_zero_rtt {
            match connecting.into_0rtt() {
                Ok((connection, zero_rtt_accepted)) => {
                    if zero_rtt_accepted.await {
                        return Ok(connection);
                    }
                    // Early data refused: fall back to a full handshake once.
                    debug!("{addr} refused 0-rtt, redialing 1-rtt");
                    let connecting = self
                        .endpoint
                        .connect(addr, QUIC_SERVER_NAME)
                        .map_err(|err| {
                            TpuSendError::new(
                                SendOutcome::ZeroRttRejected,
                                format!("1-rtt fallback connect: {err}"),
                            )
                        })?;
                    return connecting.await.map_err(|err| {
                        TpuSendError::new(
                            SendOutcome::ZeroRttRejected,
                            format!("1-rtt fallback handshake: {err}"),
                        )
                    });
                }
                Err(connecting) => {
                    return connecting.await.map_err(|err| {
                        TpuSendError::new(
                            SendOutcome::ConnectionFailed,
                            format!("handshake: {err}"),
                        )
                    });
                }
            }
        }

        connecting.await.map_err(|err| {
            TpuSendError::new(SendOutcome::ConnectionFailed, format!("handshake: {err}"))
        })
    }

    async fn write_transaction(connection: &Connection, wire: &[u8]) -> Result<(), TpuSendError> {
        let mut stream = connection.open_uni().await.map_err(|err| {
            TpuSendError::new(SendOutcome::ConnectionFailed, format!("open_uni: {err}"))
        })?;
        stream.write_all(wire).await.map_err(|err| {
            TpuSendError::new(SendOutcome::StreamClosed, format!("write: {err}"))
        })?;
        stream.finish().map_err(|err| {
            TpuSendError::new(SendOutcome::StreamClosed, format!("finish: {err}"))
        })?;
        match stream.stopped().await {
            // None: stream consumed to completion, the peer saw the finish.
            Ok(None) => Ok(()),
            Ok(Some(code)) => Err(TpuSendError::new(
                SendOutcome::StreamClosed,
                format!("peer stopped stream with code {code}"),
            )),
            Err(err) => Err(TpuSendError::new(
                SendOutcome::ConnectionFailed,
                format!("stream lost: {err}"),
            )),
        }
    }

    /// Drops pooled connections whose idle age exceeds [`MAX_IDLE_AGE`].
    pub async fn reap_idle(&self) {
        let stale: Vec<Arc<PeerState>> = {
            let peers = self.peers.lock().unwrap();
            peers.iter().map(|(_, peer)| peer.clone()).collect()
        };
        for peer in stale {
            let mut conn = peer.conn.lock().await;
            if conn.connection.is_some() && conn.last_used.elapsed() > MAX_IDLE_AGE {
                debug!("reaping idle connection to {}", peer.addr);
                if let Some(connection) = conn.connection.take() {
                    connection.close(0u32.into(), b"idle");
                }
            }
        }
    }

    /// Long-lived reaper; ends when `cancel` fires.
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => pool.reap_idle().await,
                }
            }
        })
    }

    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"done");
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}
