//! Ping client over an in-process network that mimics raw socket delivery.

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::{BufMut, Bytes, BytesMut};
    use futures::future::join_all;
    use nw_03_correlation::{LoopbackBuilder, LoopbackReply};
    use nw_05_icmp::{EchoPacket, PingClient, SystemMonotonicClock};
    use shared_types::{CoreConfig, RequestError, ICMP_PROTOCOL};

    /// Prefix an IPv4 header the way a raw ICMP socket does.
    fn with_ipv4_header(from: Ipv4Addr, icmp: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(20 + icmp.len());
        buf.put_u8(0x45);
        buf.put_u8(0);
        buf.put_u16(20 + icmp.len() as u16);
        buf.put_u32(0);
        buf.put_u8(64);
        buf.put_u8(ICMP_PROTOCOL);
        buf.put_u16(0);
        buf.put_slice(&from.octets());
        buf.put_slice(&[127, 0, 0, 1]);
        buf.put_slice(icmp);
        buf.freeze()
    }

    /// Hosts answer after `last octet` milliseconds; multiples of ten are down.
    fn network() -> LoopbackBuilder {
        LoopbackBuilder::new(|to, payload| {
            let IpAddr::V4(ip) = to.ip() else {
                return LoopbackReply::Silent;
            };
            let host = ip.octets()[3];
            if host % 10 == 0 {
                return LoopbackReply::Silent;
            }
            let Ok(request) = EchoPacket::parse(payload) else {
                return LoopbackReply::Silent;
            };
            LoopbackReply::Delayed(
                with_ipv4_header(ip, &request.to_reply().encode()),
                Duration::from_millis(u64::from(host)),
            )
        })
    }

    fn config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.timeout.precision = Duration::from_millis(10);
        config.timeout.default = Duration::from_millis(300);
        config.icmp.identifier_seed = Some(0x4E57);
        config
    }

    async fn client(network: &LoopbackBuilder) -> PingClient {
        PingClient::connect(network, &config(), Arc::new(SystemMonotonicClock::new()))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reports_reachable_hosts_with_rtt() {
        let network = network();
        let client = client(&network).await;
        let targets: Vec<IpAddr> = (1..=30u8)
            .map(|host| Ipv4Addr::new(192, 168, 7, host).into())
            .collect();

        let results = join_all(targets.iter().map(|target| client.ping(*target))).await;

        let mut reachable = 0;
        for (target, result) in targets.iter().zip(results) {
            let IpAddr::V4(ip) = target else { unreachable!() };
            let host = ip.octets()[3];
            match result {
                Ok(reply) => {
                    reachable += 1;
                    assert_eq!(reply.from, *target);
                    assert_eq!(reply.identifier, 0x4E57);
                    assert_eq!(reply.rtt_duration(), Duration::from_millis(u64::from(host)));
                }
                Err(error) => {
                    assert_eq!(host % 10, 0, "host {} should have answered", host);
                    assert_eq!(error, RequestError::Timeout(Duration::from_millis(300)));
                }
            }
        }
        assert_eq!(reachable, 27);
        assert_eq!(client.connection().pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_numbers_advance_per_ping() {
        let network = network();
        let client = client(&network).await;
        let target: IpAddr = Ipv4Addr::new(10, 1, 1, 5).into();

        let mut sequences = Vec::new();
        for _ in 0..3 {
            sequences.push(client.ping(target).await.unwrap().sequence);
        }

        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_slower_than_deadline_is_discarded() {
        let network = network();
        let client = client(&network).await;

        // 250ms latency against a 300ms deadline succeeds; a second client
        // with a 100ms deadline does not
        assert!(client.ping(Ipv4Addr::new(10, 2, 2, 250).into()).await.is_ok());

        let mut strict = config();
        strict.timeout.default = Duration::from_millis(100);
        let clock = Arc::new(SystemMonotonicClock::new());
        let impatient = PingClient::connect(&network, &strict, clock).await.unwrap();
        let result = impatient.ping(Ipv4Addr::new(10, 2, 2, 250).into()).await;
        assert_eq!(result, Err(RequestError::Timeout(Duration::from_millis(100))));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = impatient.connection().stats().await.unwrap();
        assert_eq!(stats.unknown, 1);
    }
}
