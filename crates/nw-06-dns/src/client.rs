//! Resolver client.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use nw_03_correlation::{Connection, Requester, TransportBuilder, UdpTransportBuilder};
use nw_04_timeout_decorator::{with_timeout, TimeoutDecorator};
use shared_types::{CoreConfig, ProtocolError, RequestError, TransportError};
use tracing::{debug, info};

use crate::codec::DnsCodec;
use crate::message::{DnsQuery, DnsResponse, RecordType};

/// Sends queries to one configured server.
pub struct DnsClient {
    requester: TimeoutDecorator<Connection<DnsCodec>>,
    server: SocketAddr,
}

impl DnsClient {
    /// Open a client to `config.dns` over `transports`.
    ///
    /// Transaction ids start at a random value.
    pub async fn connect(
        transports: &dyn TransportBuilder,
        config: &CoreConfig,
    ) -> Result<Self, TransportError> {
        let server = config.dns_server();
        let connection = Connection::builder("dns", DnsCodec)
            .target(server)
            .timeout_config(&config.timeout)
            .first_id(u64::from(rand::random::<u16>()))
            .connect(transports)
            .await?;

        info!(server = %server, "DNS client ready");
        Ok(Self {
            requester: with_timeout(config.timeout.default, connection),
            server,
        })
    }

    /// Open a client over a fresh UDP socket.
    pub async fn connect_udp(config: &CoreConfig) -> Result<Self, TransportError> {
        let transports = UdpTransportBuilder::for_target(config.dns_server());
        Self::connect(&transports, config).await
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Send one question and return the raw response, whatever its rcode.
    pub async fn query(&self, query: DnsQuery) -> Result<DnsResponse, RequestError> {
        self.requester.request(query).await
    }

    /// Resolve `host` to addresses of `record_type`'s family.
    ///
    /// IP literals and `localhost` are answered without a query. A non-zero
    /// rcode is reported as [`ProtocolError::ResponseCode`].
    pub async fn resolve(
        &self,
        host: &str,
        record_type: RecordType,
    ) -> Result<Vec<IpAddr>, RequestError> {
        if let Ok(literal) = host.parse::<IpAddr>() {
            return Ok(vec![literal]);
        }
        if host.trim_end_matches('.').eq_ignore_ascii_case("localhost") {
            return Ok(vec![match record_type {
                RecordType::A => Ipv4Addr::LOCALHOST.into(),
                RecordType::Aaaa => Ipv6Addr::LOCALHOST.into(),
            }]);
        }

        let response = self.query(DnsQuery::new(host, record_type)).await?;
        if response.rcode != 0 {
            debug!(host, rcode = response.rcode, "Resolution failed");
            return Err(ProtocolError::ResponseCode(response.rcode).into());
        }
        let addresses: Vec<IpAddr> = response
            .addresses
            .into_iter()
            .filter(|addr| RecordType::for_addr(addr) == record_type)
            .collect();
        debug!(host, %record_type, found = addresses.len(), "Resolved");
        Ok(addresses)
    }

    pub fn connection(&self) -> &Connection<DnsCodec> {
        self.requester.inner()
    }

    pub fn close(&self) {
        self.requester.close();
    }
}
