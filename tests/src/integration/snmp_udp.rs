//! SNMP client against an agent on a real UDP socket.

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::time::Duration;

    use bytes::Bytes;
    use nw_07_snmp::{Oid, SnmpClient, SnmpValue};
    use shared_types::{CoreConfig, RequestError};

    use crate::fixtures::{fake_agent, fast_config, interfaces_mib, oid, silent_peer, FakePeer};

    const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";

    fn config_for(peer: &FakePeer, bulk_size: u32) -> CoreConfig {
        let mut config = fast_config();
        config.snmp.port = peer.addr().port();
        config.snmp.bulk_size = bulk_size;
        config
    }

    async fn client_for(peer: &FakePeer, bulk_size: u32) -> SnmpClient {
        SnmpClient::connect_udp(peer.addr().ip(), &config_for(peer, bulk_size))
            .await
            .unwrap()
    }

    /// Read a whole subtree page by page.
    async fn walk(client: &SnmpClient, root: &Oid) -> Result<(Vec<String>, usize), RequestError> {
        let mut names = Vec::new();
        let mut pages = 0;
        let mut page = client.get_bulk_page(root).await?;
        loop {
            pages += 1;
            names.extend(page.bindings.iter().map(|binding| binding.value.to_string()));
            match page.next {
                Some(next) => page = client.get_bulk_page_after(root, &next).await?,
                None => return Ok((names, pages)),
            }
        }
    }

    // =========================================================================
    // GET
    // =========================================================================

    #[tokio::test]
    async fn test_get_existing_and_missing_objects() {
        let agent = fake_agent("public", interfaces_mib()).await.unwrap();
        let client = client_for(&agent, 10).await;

        let descr = client.get(&oid("1.3.6.1.2.1.1.1.0")).await.unwrap();
        let missing = client.get(&oid("1.3.6.1.2.1.1.99.0")).await.unwrap();

        assert_eq!(
            descr,
            Some(SnmpValue::OctetString(Bytes::from_static(b"netwatch test agent")))
        );
        assert_eq!(missing, None);
        assert_eq!(client.agent().ip(), IpAddr::from([127, 0, 0, 1]));
    }

    #[tokio::test]
    async fn test_wrong_community_is_ignored_until_timeout() {
        let agent = fake_agent("private", interfaces_mib()).await.unwrap();
        let mut config = config_for(&agent, 10);
        config.timeout.default = Duration::from_millis(200);
        let client = SnmpClient::connect_udp(agent.addr().ip(), &config).await.unwrap();

        let result = client.get(&oid("1.3.6.1.2.1.1.1.0")).await;

        assert_eq!(result, Err(RequestError::Timeout(Duration::from_millis(200))));
        assert_eq!(agent.received(), 1);
    }

    // =========================================================================
    // GETBULK paging
    // =========================================================================

    #[tokio::test]
    async fn test_single_page_covers_small_table() {
        let agent = fake_agent("public", interfaces_mib()).await.unwrap();
        let client = client_for(&agent, 10).await;

        let page = client.get_bulk_page(&oid(IF_DESCR)).await.unwrap();

        // The agent ran past the column, so there is no continuation
        assert_eq!(page.bindings.len(), 5);
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_walk_across_pages_stays_in_subtree() {
        let agent = fake_agent("public", interfaces_mib()).await.unwrap();
        let client = client_for(&agent, 2).await;

        let (names, pages) = walk(&client, &oid(IF_DESCR)).await.unwrap();

        assert_eq!(names, vec!["lo", "eth0", "eth1", "wlan0", "br0"]);
        assert_eq!(pages, 3);
        assert_eq!(agent.received(), 3);
    }

    #[tokio::test]
    async fn test_walk_of_empty_subtree() {
        let agent = fake_agent("public", interfaces_mib()).await.unwrap();
        let client = client_for(&agent, 4).await;

        let (names, pages) = walk(&client, &oid("1.3.6.1.4.1.9999")).await.unwrap();

        assert!(names.is_empty());
        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn test_silent_agent_times_out() {
        let agent = silent_peer().await.unwrap();
        let mut config = config_for(&agent, 10);
        config.timeout.default = Duration::from_millis(150);
        let client = SnmpClient::connect_udp(agent.addr().ip(), &config).await.unwrap();

        let error = client.get_bulk_page(&oid(IF_DESCR)).await.unwrap_err();

        assert!(error.is_timeout());
        assert_eq!(client.connection().pending_count().await, 0);
    }
}
