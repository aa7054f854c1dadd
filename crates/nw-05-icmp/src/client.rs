//! Ping client: a timeout-decorated ICMP connection.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use nw_03_correlation::{Connection, RequestHandle, Requester, Respond, TransportBuilder};
use nw_04_timeout_decorator::{with_timeout, TimeoutDecorator};
use shared_types::{CoreConfig, RequestError, TransportError};
use tracing::{debug, info};

use crate::clock::MonotonicClock;
use crate::codec::{EchoReply, IcmpEchoCodec};
#[cfg(unix)]
use crate::clock::SystemMonotonicClock;
#[cfg(unix)]
use crate::transport::IcmpSocketBuilder;
#[cfg(unix)]
use shared_types::IcmpSocketKind;

/// Sends echo requests and matches their replies.
pub struct PingClient {
    requester: TimeoutDecorator<Connection<IcmpEchoCodec>>,
}

impl PingClient {
    /// Open a ping connection over `transports`.
    ///
    /// Identifiers start at the configured seed (or the process id) and
    /// sequence numbers at zero; every ping is bounded by
    /// `config.timeout.default`.
    pub async fn connect(
        transports: &dyn TransportBuilder,
        config: &CoreConfig,
        clock: Arc<dyn MonotonicClock>,
    ) -> Result<Self, TransportError> {
        let identifier = config.icmp.identifier();
        let codec = IcmpEchoCodec::with_protocol(config.icmp.protocol, clock);
        Self::open(transports, config, codec, u64::from(identifier) << 16).await
    }

    /// Open a ping connection over an OS ICMP socket of kind
    /// `config.icmp.socket`.
    ///
    /// Raw sockets need root or `CAP_NET_RAW`; ping sockets need the
    /// process group inside `net.ipv4.ping_group_range` and keep one echo
    /// identifier, correlating on the sequence number. Without the
    /// privilege this fails with a `PermissionDenied` transport error.
    #[cfg(unix)]
    pub async fn connect_raw(config: &CoreConfig) -> Result<Self, TransportError> {
        let identifier = config.icmp.identifier();
        let transports = IcmpSocketBuilder::new(config.icmp.socket, identifier);
        let clock: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonicClock::new());
        let codec = IcmpEchoCodec::with_protocol(config.icmp.protocol, clock);
        match config.icmp.socket {
            IcmpSocketKind::Raw => {
                Self::open(&transports, config, codec, u64::from(identifier) << 16).await
            }
            IcmpSocketKind::Dgram => {
                Self::open(&transports, config, codec.pinned(identifier), 0).await
            }
        }
    }

    async fn open(
        transports: &dyn TransportBuilder,
        config: &CoreConfig,
        codec: IcmpEchoCodec,
        first_id: u64,
    ) -> Result<Self, TransportError> {
        let pinned = codec.pinned_identifier().is_some();
        let connection = Connection::builder("icmp", codec)
            .timeout_config(&config.timeout)
            .first_id(first_id)
            .connect(transports)
            .await?;

        info!(
            identifier = config.icmp.identifier(),
            pinned,
            timeout_ms = config.timeout.default.as_millis() as u64,
            "Ping client ready"
        );
        Ok(Self {
            requester: with_timeout(config.timeout.default, connection),
        })
    }

    /// Ping `target` once.
    pub async fn ping(&self, target: IpAddr) -> Result<EchoReply, RequestError> {
        let result = self.requester.request(target).await;
        if let Ok(reply) = &result {
            debug!(target = %target, sequence = reply.sequence, rtt = reply.rtt, "Echo reply");
        }
        result
    }

    /// Ping `target`, delivering the outcome to `respond`.
    pub fn ping_with(&self, target: IpAddr, respond: Respond<EchoReply>) -> RequestHandle {
        self.requester.issue(target, respond)
    }

    pub fn timeout(&self) -> Duration {
        self.requester.timeout()
    }

    pub fn connection(&self) -> &Connection<IcmpEchoCodec> {
        self.requester.inner()
    }

    /// Fail outstanding pings with `Closed` and release the transport.
    pub fn close(&self) {
        self.requester.close();
    }
}
