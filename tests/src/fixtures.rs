//! Fake network peers bound to 127.0.0.1.
//!
//! Each fixture owns a tokio `UdpSocket` and answers from a spawned task
//! until dropped.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use nw_07_snmp::{Message, Oid, Pdu, PduType, SnmpValue, VarBind};
use shared_types::CoreConfig;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Configuration with short deadlines suited to loopback traffic.
pub fn fast_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.timeout.precision = Duration::from_millis(50);
    config.timeout.default = Duration::from_secs(2);
    config
}

/// A running fake peer.
pub struct FakePeer {
    addr: SocketAddr,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakePeer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Datagrams the peer has read so far.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

impl Drop for FakePeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bind a peer that calls `answer` for every datagram and sends back
/// whatever it returns.
async fn serve<F>(answer: F) -> Result<FakePeer>
where
    F: Fn(&[u8]) -> Option<Bytes> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .context("binding fake peer")?;
    let addr = socket.local_addr()?;
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);

    let task = tokio::spawn(async move {
        let mut buffer = vec![0u8; 65_535];
        while let Ok((len, from)) = socket.recv_from(&mut buffer).await {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(reply) = answer(&buffer[..len]) {
                let _ = socket.send_to(&reply, from).await;
            }
        }
    });

    Ok(FakePeer {
        addr,
        received,
        task,
    })
}

/// Peer that reads every datagram and never answers.
pub async fn silent_peer() -> Result<FakePeer> {
    serve(|_| None).await
}

// =============================================================================
// DNS
// =============================================================================

/// Resolver answering A and AAAA questions from a fixed zone.
///
/// Unknown names get NXDOMAIN.
pub async fn fake_resolver(zone: HashMap<String, Vec<IpAddr>>) -> Result<FakePeer> {
    serve(move |query| answer_dns(&zone, query).ok()).await
}

fn answer_dns(zone: &HashMap<String, Vec<IpAddr>>, query: &[u8]) -> Result<Bytes> {
    let (name, question_end) = read_question_name(query)?;
    if query.len() < question_end + 4 {
        bail!("question truncated");
    }
    let qtype = u16::from_be_bytes([query[question_end], query[question_end + 1]]);

    let records: Vec<Vec<u8>> = zone
        .get(&name)
        .map(|addrs| {
            addrs
                .iter()
                .filter_map(|addr| match (addr, qtype) {
                    (IpAddr::V4(v4), 1) => Some(v4.octets().to_vec()),
                    (IpAddr::V6(v6), 28) => Some(v6.octets().to_vec()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let rcode = if zone.contains_key(&name) { 0 } else { 3 };

    let mut buf = BytesMut::from(&query[..question_end + 4]);
    buf[2] |= 0x80;
    buf[3] = (buf[3] & 0xF0) | rcode;
    buf[6..8].copy_from_slice(&(records.len() as u16).to_be_bytes());
    for data in records {
        buf.put_u16(0xC00C);
        buf.put_u16(qtype);
        buf.put_u16(1);
        buf.put_u32(60);
        buf.put_u16(data.len() as u16);
        buf.put_slice(&data);
    }
    Ok(buf.freeze())
}

/// Dotted name of the single question and the offset just past it.
fn read_question_name(query: &[u8]) -> Result<(String, usize)> {
    let mut labels = Vec::new();
    let mut pos = 12;
    loop {
        let len = usize::from(*query.get(pos).context("name runs past packet")?);
        pos += 1;
        if len == 0 {
            break;
        }
        let label = query.get(pos..pos + len).context("label runs past packet")?;
        labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
        pos += len;
    }
    Ok((labels.join("."), pos))
}

// =============================================================================
// SNMP
// =============================================================================

/// SNMPv2c agent serving GET and GETBULK from an ordered MIB.
///
/// Requests carrying a different community are ignored.
pub async fn fake_agent(community: &str, mib: BTreeMap<Oid, SnmpValue>) -> Result<FakePeer> {
    let community = community.to_string();
    serve(move |payload| {
        let request = Message::decode(payload).ok()?;
        if request.community != community.as_bytes() {
            return None;
        }
        let pdu = answer_snmp(&mib, request.pdu)?;
        Some(Message::new(&community, pdu).encode())
    })
    .await
}

fn answer_snmp(mib: &BTreeMap<Oid, SnmpValue>, request: Pdu) -> Option<Pdu> {
    let bindings = match request.kind {
        PduType::Get => request
            .bindings
            .into_iter()
            .map(|binding| {
                let value = mib
                    .get(&binding.oid)
                    .cloned()
                    .unwrap_or(SnmpValue::NoSuchObject);
                VarBind::new(binding.oid, value)
            })
            .collect(),
        PduType::GetBulk => {
            let start = request.bindings.first()?.oid.clone();
            let max = usize::try_from(request.error_index).unwrap_or(0);
            let mut page: Vec<VarBind> = mib
                .iter()
                .filter(|(oid, _)| **oid > start)
                .take(max)
                .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
                .collect();
            if page.len() < max {
                let last = page.last().map_or(start, |binding| binding.oid.clone());
                page.push(VarBind::new(last, SnmpValue::EndOfMibView));
            }
            page
        }
        _ => return None,
    };
    Some(Pdu::response(request.request_id, bindings))
}

/// A small interfaces table under `1.3.6.1.2.1.2.2.1.2` plus sysDescr.
pub fn interfaces_mib() -> BTreeMap<Oid, SnmpValue> {
    let mut mib = BTreeMap::new();
    mib.insert(
        oid("1.3.6.1.2.1.1.1.0"),
        SnmpValue::OctetString(Bytes::from_static(b"netwatch test agent")),
    );
    for (index, name) in ["lo", "eth0", "eth1", "wlan0", "br0"].iter().enumerate() {
        mib.insert(
            oid("1.3.6.1.2.1.2.2.1.2").child(index as u32 + 1),
            SnmpValue::OctetString(Bytes::from(name.to_string())),
        );
    }
    mib.insert(oid("1.3.6.1.2.1.2.2.1.3.1"), SnmpValue::Integer(24));
    mib
}

pub fn oid(text: &str) -> Oid {
    text.parse().unwrap_or_else(|_| panic!("invalid test OID {}", text))
}
