//! SNMP client for one agent.

use std::net::{IpAddr, SocketAddr};

use nw_03_correlation::{Connection, Requester, TransportBuilder, UdpTransportBuilder};
use nw_04_timeout_decorator::{with_timeout, TimeoutDecorator};
use shared_types::{CoreConfig, RequestError, TransportError};
use tracing::{debug, info};

use crate::codec::{SnmpCodec, SnmpRequest};
use crate::oid::Oid;
use crate::pdu::{SnmpValue, VarBind};

/// One GETBULK page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpPage {
    /// Bindings inside the requested subtree, exception values removed.
    pub bindings: Vec<VarBind>,
    /// Where the next page starts, when the subtree may continue.
    pub next: Option<Oid>,
}

pub struct SnmpClient {
    requester: TimeoutDecorator<Connection<SnmpCodec>>,
    agent: SocketAddr,
}

impl SnmpClient {
    /// Open a client to `agent` on the configured SNMP port.
    pub async fn connect(
        transports: &dyn TransportBuilder,
        agent: IpAddr,
        config: &CoreConfig,
    ) -> Result<Self, TransportError> {
        let agent = SocketAddr::new(agent, config.snmp.port);
        let connection = Connection::builder("snmp", SnmpCodec::from_config(&config.snmp))
            .target(agent)
            .timeout_config(&config.timeout)
            .connect(transports)
            .await?;

        info!(agent = %agent, bulk_size = config.snmp.bulk_size, "SNMP client ready");
        Ok(Self {
            requester: with_timeout(config.timeout.default, connection),
            agent,
        })
    }

    pub async fn connect_udp(agent: IpAddr, config: &CoreConfig) -> Result<Self, TransportError> {
        let transports = UdpTransportBuilder::for_target(SocketAddr::new(agent, config.snmp.port));
        Self::connect(&transports, agent, config).await
    }

    pub fn agent(&self) -> SocketAddr {
        self.agent
    }

    /// Fetch one object. `None` when the agent reports it missing.
    pub async fn get(&self, oid: &Oid) -> Result<Option<SnmpValue>, RequestError> {
        let bindings = self.requester.request(SnmpRequest::Get(oid.clone())).await?;
        let value = bindings
            .into_iter()
            .find(|binding| binding.oid == *oid)
            .map(|binding| binding.value)
            .filter(|value| !value.is_exception());
        debug!(oid = %oid, found = value.is_some(), "GET complete");
        Ok(value)
    }

    /// Fetch the bindings following `oid` within its subtree, one GETBULK
    /// round trip.
    pub async fn get_bulk_page(&self, oid: &Oid) -> Result<SnmpPage, RequestError> {
        self.get_bulk_page_after(oid, oid).await
    }

    /// Continue a subtree read: fetch the bindings following `start`, keeping
    /// only those under `root`.
    ///
    /// `next` is set only when every returned binding stayed inside the
    /// subtree and the agent made progress past `start`.
    pub async fn get_bulk_page_after(
        &self,
        root: &Oid,
        start: &Oid,
    ) -> Result<SnmpPage, RequestError> {
        let returned = self
            .requester
            .request(SnmpRequest::GetBulk(start.clone()))
            .await?;
        let page = page_within(root, start, returned);
        debug!(
            root = %root,
            start = %start,
            bindings = page.bindings.len(),
            more = page.next.is_some(),
            "GETBULK page"
        );
        Ok(page)
    }

    pub fn connection(&self) -> &Connection<SnmpCodec> {
        self.requester.inner()
    }

    pub fn close(&self) {
        self.requester.close();
    }
}

fn page_within(root: &Oid, start: &Oid, returned: Vec<VarBind>) -> SnmpPage {
    let total = returned.len();
    let bindings: Vec<VarBind> = returned
        .into_iter()
        .take_while(|binding| binding.oid.starts_with(root))
        .filter(|binding| !binding.value.is_exception())
        .collect();

    let complete = total > 0 && bindings.len() == total;
    let next = match bindings.last() {
        Some(last) if complete && last.oid > *start => Some(last.oid.clone()),
        _ => None,
    };
    SnmpPage { bindings, next }
}
