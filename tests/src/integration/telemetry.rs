//! Logging bootstrap alongside live clients.

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    use nw_03_correlation::{LoopbackBuilder, LoopbackReply};
    use nw_05_icmp::{EchoPacket, PingClient, SystemMonotonicClock};
    use nw_telemetry::{init_logging, init_test_logging, TelemetryConfig, TelemetryError};
    use shared_types::CoreConfig;

    #[test]
    fn test_second_global_subscriber_refused() {
        init_test_logging();
        init_test_logging();

        let result = init_logging(&TelemetryConfig::for_client("ping", "debug"));

        assert!(matches!(result, Err(TelemetryError::AlreadyInitialized(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_log_through_installed_subscriber() {
        init_test_logging();
        let network = LoopbackBuilder::new(|_, payload| match EchoPacket::parse(payload) {
            Ok(request) => LoopbackReply::Reply(request.to_reply().encode()),
            Err(_) => LoopbackReply::Silent,
        });
        let mut config = CoreConfig::default();
        config.timeout.default = Duration::from_millis(100);

        let client = PingClient::connect(&network, &config, Arc::new(SystemMonotonicClock::new()))
            .await
            .unwrap();
        let reply = client.ping(Ipv4Addr::new(10, 0, 0, 1).into()).await.unwrap();

        assert_eq!(reply.rtt_duration(), Duration::ZERO);
    }
}
