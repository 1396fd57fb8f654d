//! # Request / Response Flows
//!
//! End-to-end round trips through the topic bus:
//!
//! 1. **Caller → mapping topic → request topic**: `publish_request`
//! 2. **Processor → private response topic**: `CommandProcessor`
//! 3. **Response topic → waiters**: consumer task and dispatcher

#[cfg(test)]
mod tests {
    use crate::integration::processor::{
        provision_bus, CommandProcessor, ReplyMode, TransferCommand, TransferResult,
    };
    use request_api::adapters::{connect, BusSerdes};
    use request_api::{RequestApi, RequestApiConfig, RequestError, RequestId};
    use request_telemetry::{init_logging, RequestMetrics, TelemetryConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    type TransferApi = RequestApi<String, TransferCommand, TransferResult>;

    const WAIT: Duration = Duration::from_secs(2);

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    async fn start(
        config: RequestApiConfig,
        mode: ReplyMode,
    ) -> (TransferApi, CommandProcessor, Arc<shared_bus::InMemoryTopicBus>) {
        // Several tests share the process; only the first install wins
        let _ = init_logging(&TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        });

        let bus = provision_bus(&config, 4).unwrap();
        let processor = CommandProcessor::start(Arc::clone(&bus), &config, mode).unwrap();
        let api = connect(Arc::clone(&bus), config, BusSerdes::json())
            .await
            .unwrap();
        (api, processor, bus)
    }

    async fn transfer(api: &TransferApi, account: &str, amount: u64) -> TransferResult {
        let command = TransferCommand::new(account, amount);
        api.publish_request(&account.to_string(), command.request_id, &command)
            .await
            .unwrap();
        timeout(WAIT, api.query_response(command.request_id, WAIT))
            .await
            .expect("timeout waiting for response")
            .expect("response should resolve")
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    // =========================================================================
    // ROUND TRIPS
    // =========================================================================

    #[tokio::test]
    async fn test_accepted_round_trip() {
        let (api, processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;

        let result = transfer(&api, "acct-1", 250).await;

        assert!(result.accepted);
        assert_eq!(result.reason, None);
        assert_eq!(processor.processed(), 1);
        assert_eq!(api.stats().responses_delivered, 1);
    }

    #[tokio::test]
    async fn test_rejected_round_trip() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;

        let result = transfer(&api, "acct-1", 5_000).await;

        assert!(!result.accepted);
        assert!(result.reason.unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_all_waiters_receive_same_response() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;
        let command = TransferCommand::new("acct-7", 10);

        api.publish_request(&"acct-7".to_string(), command.request_id, &command)
            .await
            .unwrap();
        let waiters: Vec<_> = (0..3)
            .map(|_| api.query_response(command.request_id, WAIT))
            .collect();

        let results = timeout(WAIT, futures::future::join_all(waiters))
            .await
            .unwrap();
        for result in results {
            assert_eq!(result.unwrap().request_id, command.request_id);
        }

        // A query after resolution reads the cached value
        let late = api.query_response(command.request_id, WAIT).await.unwrap();
        assert!(late.accepted);
        assert_eq!(api.stats().responses_delivered, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_across_partitions() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;

        let flows = (0..50u64).map(|i| {
            let api = &api;
            async move {
                let account = format!("acct-{}", i % 8);
                let result = transfer(api, &account, i * 40).await;
                (i, result)
            }
        });
        let results = futures::future::join_all(flows).await;

        for (i, result) in results {
            assert_eq!(result.accepted, i * 40 <= 1_000, "request {}", i);
        }
        let stats = api.stats();
        assert_eq!(stats.requests_published, 50);
        assert_eq!(stats.responses_delivered, 50);
        assert_eq!(stats.responses_dropped, 0);
    }

    #[tokio::test]
    async fn test_redelivered_response_keeps_first() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Twice).await;

        let result = transfer(&api, "acct-1", 1).await;
        assert!(result.accepted);

        wait_until(|| api.stats().duplicate_responses == 1).await;
        assert_eq!(api.stats().responses_delivered, 1);
    }

    #[tokio::test]
    async fn test_query_for_unpublished_id_fails() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;
        let id = RequestId::new();

        let err = api.query_response(id, WAIT).await.unwrap_err();
        assert_eq!(err, RequestError::UnknownRequestId(id));
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    #[tokio::test]
    async fn test_each_caller_gets_responses_on_its_own_topic() {
        let config_a = RequestApiConfig {
            private_response_topic: "command_response_a".to_string(),
            ..RequestApiConfig::default()
        };
        let config_b = RequestApiConfig {
            private_response_topic: "command_response_b".to_string(),
            ..RequestApiConfig::default()
        };

        let bus = provision_bus(&config_a, 2).unwrap();
        let _processor =
            CommandProcessor::start(Arc::clone(&bus), &config_a, ReplyMode::Once).unwrap();
        let api_a: TransferApi = connect(Arc::clone(&bus), config_a, BusSerdes::json())
            .await
            .unwrap();
        let api_b: TransferApi = connect(Arc::clone(&bus), config_b, BusSerdes::json())
            .await
            .unwrap();

        let from_a = transfer(&api_a, "acct-a", 5).await;
        let from_b = transfer(&api_b, "acct-b", 5_000).await;

        assert!(from_a.accepted);
        assert!(!from_b.accepted);
        // Neither caller saw the other's response
        assert_eq!(api_a.stats().responses_dropped, 0);
        assert_eq!(api_b.stats().responses_dropped, 0);
        assert_eq!(api_a.stats().responses_delivered, 1);
        assert_eq!(api_b.stats().responses_delivered, 1);
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_close_stops_response_delivery() {
        let (api, processor, bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;
        let private_topic = api.config().private_response_topic.clone();
        let command = TransferCommand::new("acct-1", 5);

        api.publish_request(&"acct-1".to_string(), command.request_id, &command)
            .await
            .unwrap();
        api.close();
        assert!(api.is_closed());

        wait_until(|| bus.subscriber_count(&private_topic) == 0).await;
        wait_until(|| processor.processed() == 1).await;

        // The waiter is attached but nothing will complete it
        let pending = api.query_response(command.request_id, WAIT);
        assert!(timeout(Duration::from_millis(100), pending).await.is_err());
        assert_eq!(api.stats().responses_delivered, 0);
    }

    // =========================================================================
    // TELEMETRY
    // =========================================================================

    #[tokio::test]
    async fn test_metrics_reflect_traffic() {
        let (api, _processor, _bus) = start(RequestApiConfig::default(), ReplyMode::Once).await;
        transfer(&api, "acct-1", 5).await;
        transfer(&api, "acct-2", 6).await;

        let metrics = RequestMetrics::new("request_api").unwrap();
        metrics.observe(&api.stats(), api.pending_count());
        let text = metrics.encode().unwrap();

        assert!(text.contains("request_api_requests_published_total 2"));
        assert!(text.contains("request_api_responses_delivered_total 2"));
        assert!(text.contains("request_api_pending_requests 2"));
    }
}
