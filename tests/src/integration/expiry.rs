//! # Retention Window
//!
//! Entries live for the retention window measured from registration. Sweeps
//! run on every publish, and optionally on a timer.

#[cfg(test)]
mod tests {
    use crate::integration::processor::{
        provision_bus, CommandProcessor, ReplyMode, TransferCommand, TransferResult,
    };
    use request_api::adapters::{connect, connect_with_time_source, BusSerdes};
    use request_api::{
        ManualTimeSource, RequestApi, RequestApiConfig, RequestError, RequestIdSerde, Serde,
        WindowSpec,
    };
    use shared_bus::TopicPublisher;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    type TransferApi = RequestApi<String, TransferCommand, TransferResult>;

    const WAIT: Duration = Duration::from_secs(2);

    fn five_second_window() -> RequestApiConfig {
        RequestApiConfig {
            response_window: WindowSpec::new(Duration::from_secs(5)),
            ..RequestApiConfig::default()
        }
    }

    async fn publish(api: &TransferApi, command: &TransferCommand) {
        api.publish_request(&command.account, command.request_id, command)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_on_next_publish() {
        let config = five_second_window();
        let bus = provision_bus(&config, 1).unwrap();
        let _processor =
            CommandProcessor::start(Arc::clone(&bus), &config, ReplyMode::Never).unwrap();
        let clock = Arc::new(ManualTimeSource::new(0));
        let api: TransferApi =
            connect_with_time_source(bus, config, BusSerdes::json(), clock.clone())
                .await
                .unwrap();

        let stalled = TransferCommand::new("acct-1", 5);
        publish(&api, &stalled).await;
        let first = api.query_response(stalled.request_id, WAIT);
        let second = api.query_response(stalled.request_id, WAIT);

        clock.advance(Duration::from_secs(6));
        publish(&api, &TransferCommand::new("acct-2", 5)).await;

        assert_eq!(
            first.await.unwrap_err(),
            RequestError::TimedOut(stalled.request_id)
        );
        assert!(second.await.unwrap_err().is_timeout());

        let stats = api.stats();
        assert_eq!(stats.entries_evicted, 1);
        assert_eq!(stats.waiters_timed_out, 2);
        assert_eq!(
            api.query_response(stalled.request_id, WAIT).await.unwrap_err(),
            RequestError::UnknownRequestId(stalled.request_id)
        );
    }

    #[tokio::test]
    async fn test_resolved_response_cached_within_window() {
        let config = five_second_window();
        let bus = provision_bus(&config, 1).unwrap();
        let _processor =
            CommandProcessor::start(Arc::clone(&bus), &config, ReplyMode::Once).unwrap();
        let clock = Arc::new(ManualTimeSource::new(0));
        let api: TransferApi =
            connect_with_time_source(bus, config, BusSerdes::json(), clock.clone())
                .await
                .unwrap();

        let command = TransferCommand::new("acct-1", 5);
        publish(&api, &command).await;
        let first = timeout(WAIT, api.query_response(command.request_id, WAIT))
            .await
            .unwrap()
            .unwrap();

        clock.advance(Duration::from_secs(4));
        publish(&api, &TransferCommand::new("acct-2", 5)).await;

        let cached = api.query_response(command.request_id, WAIT).await.unwrap();
        assert_eq!(cached, first);
        assert_eq!(api.stats().entries_evicted, 0);
    }

    #[tokio::test]
    async fn test_response_after_eviction_is_dropped() {
        let config = five_second_window();
        let private_topic = config.private_response_topic.clone();
        let bus = provision_bus(&config, 1).unwrap();
        let _processor =
            CommandProcessor::start(Arc::clone(&bus), &config, ReplyMode::Never).unwrap();
        let clock = Arc::new(ManualTimeSource::new(0));
        let api: TransferApi = connect_with_time_source(
            Arc::clone(&bus),
            config,
            BusSerdes::json(),
            clock.clone(),
        )
        .await
        .unwrap();

        let late = TransferCommand::new("acct-1", 5);
        publish(&api, &late).await;
        clock.advance(Duration::from_secs(6));
        assert_eq!(api.remove_stale(), 1);

        let result = TransferResult {
            request_id: late.request_id,
            accepted: true,
            reason: None,
        };
        bus.publish(
            &private_topic,
            RequestIdSerde.serialize(&late.request_id).unwrap(),
            serde_json::to_vec(&result).unwrap(),
        )
        .await
        .unwrap();

        timeout(WAIT, async {
            while api.stats().responses_dropped == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        // No entry is recreated by the late response
        assert_eq!(api.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_periodic_sweep_times_out_without_traffic() {
        let config = RequestApiConfig {
            response_window: WindowSpec::new(Duration::from_millis(50)),
            sweep_interval: Some(Duration::from_millis(20)),
            ..RequestApiConfig::default()
        };
        let bus = provision_bus(&config, 1).unwrap();
        let _processor =
            CommandProcessor::start(Arc::clone(&bus), &config, ReplyMode::Never).unwrap();
        let api: TransferApi = connect(bus, config, BusSerdes::json()).await.unwrap();

        let stalled = TransferCommand::new("acct-1", 5);
        publish(&api, &stalled).await;

        let outcome = timeout(WAIT, api.query_response(stalled.request_id, WAIT))
            .await
            .expect("periodic sweep should fail the waiter");
        assert_eq!(outcome.unwrap_err(), RequestError::TimedOut(stalled.request_id));
        assert_eq!(api.pending_count(), 0);
    }
}
