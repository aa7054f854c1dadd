//! DNS client against a resolver on a real UDP socket.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    use futures::future::join_all;
    use nw_06_dns::{DnsClient, DnsQuery, RecordType};
    use shared_types::{CoreConfig, ProtocolError, RequestError};

    use crate::fixtures::{fake_resolver, fast_config, silent_peer, FakePeer};

    fn zone() -> HashMap<String, Vec<IpAddr>> {
        let mut zone = HashMap::new();
        zone.insert(
            "router.lan".to_string(),
            vec![
                Ipv4Addr::new(192, 168, 1, 1).into(),
                "fd00::1".parse().unwrap(),
            ],
        );
        zone.insert(
            "printer.lan".to_string(),
            vec![Ipv4Addr::new(192, 168, 1, 40).into()],
        );
        zone
    }

    fn config_for(peer: &FakePeer) -> CoreConfig {
        let mut config = fast_config();
        config.dns.server = peer.addr().ip();
        config.dns.port = peer.addr().port();
        config
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[tokio::test]
    async fn test_resolves_a_and_aaaa_records() {
        let resolver = fake_resolver(zone()).await.unwrap();
        let client = DnsClient::connect_udp(&config_for(&resolver)).await.unwrap();

        let v4 = client.resolve("router.lan", RecordType::A).await.unwrap();
        let v6 = client.resolve("router.lan", RecordType::Aaaa).await.unwrap();

        assert_eq!(v4, vec![IpAddr::from(Ipv4Addr::new(192, 168, 1, 1))]);
        assert_eq!(v6, vec!["fd00::1".parse::<IpAddr>().unwrap()]);
        assert_eq!(resolver.received(), 2);
    }

    #[tokio::test]
    async fn test_unknown_name_reports_nxdomain() {
        let resolver = fake_resolver(zone()).await.unwrap();
        let client = DnsClient::connect_udp(&config_for(&resolver)).await.unwrap();

        assert_eq!(
            client.resolve("missing.lan", RecordType::A).await,
            Err(RequestError::Protocol(ProtocolError::ResponseCode(3)))
        );

        // Raw query still returns the response
        let response = client
            .query(DnsQuery::new("missing.lan", RecordType::A))
            .await
            .unwrap();
        assert_eq!(response.rcode, 3);
        assert_eq!(response.answer_count, 0);
    }

    #[tokio::test]
    async fn test_literals_and_localhost_skip_the_network() {
        let resolver = fake_resolver(zone()).await.unwrap();
        let client = DnsClient::connect_udp(&config_for(&resolver)).await.unwrap();

        assert_eq!(
            client.resolve("10.9.8.7", RecordType::A).await.unwrap(),
            vec![IpAddr::from(Ipv4Addr::new(10, 9, 8, 7))]
        );
        assert_eq!(
            client.resolve("localhost", RecordType::Aaaa).await.unwrap(),
            vec![IpAddr::from(Ipv6Addr::LOCALHOST)]
        );
        assert_eq!(resolver.received(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_queries_matched_by_transaction_id() {
        let resolver = fake_resolver(zone()).await.unwrap();
        let client = DnsClient::connect_udp(&config_for(&resolver)).await.unwrap();
        let hosts = ["router.lan", "printer.lan", "router.lan", "printer.lan"];

        let results = join_all(hosts.iter().map(|host| client.resolve(host, RecordType::A))).await;

        let expected = |host: &str| -> IpAddr {
            if host == "router.lan" {
                Ipv4Addr::new(192, 168, 1, 1).into()
            } else {
                Ipv4Addr::new(192, 168, 1, 40).into()
            }
        };
        for (host, result) in hosts.iter().zip(results) {
            assert_eq!(result.unwrap(), vec![expected(host)]);
        }
        assert_eq!(client.connection().pending_count().await, 0);
    }

    // =========================================================================
    // Failure paths
    // =========================================================================

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let server = silent_peer().await.unwrap();
        let mut config = config_for(&server);
        config.timeout.default = Duration::from_millis(200);
        let client = DnsClient::connect_udp(&config).await.unwrap();

        let result = client.resolve("router.lan", RecordType::A).await;

        assert_eq!(result, Err(RequestError::Timeout(Duration::from_millis(200))));
        assert_eq!(server.received(), 1);
        assert_eq!(client.connection().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_fails_outstanding_query() {
        let server = silent_peer().await.unwrap();
        let client = DnsClient::connect_udp(&config_for(&server)).await.unwrap();

        let pending = client.query(DnsQuery::new("router.lan", RecordType::A));
        let (result, ()) = tokio::join!(pending, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.close();
        });

        assert_eq!(result, Err(RequestError::Closed));
        assert!(client.connection().is_closed());
    }
}
