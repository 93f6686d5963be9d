// Broker event loop feeding the stream adapter
use crate::application::stream_service::StreamAdapter;
use crate::domain::dashboard::LinkState;
use crate::infrastructure::config::{BrokerTransport, StreamSettings};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, MqttOptions, Packet, QoS, SubscribeFilter, Transport,
};
use std::sync::Arc;
use std::time::Duration;

const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Where topic subscriptions are sent after each connection.
#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    async fn subscribe_all(&self, topics: Vec<String>) -> Result<(), ClientError>;
}

#[async_trait]
impl TopicSubscriber for AsyncClient {
    async fn subscribe_all(&self, topics: Vec<String>) -> Result<(), ClientError> {
        let filters: Vec<SubscribeFilter> = topics
            .into_iter()
            .map(|topic| SubscribeFilter::new(topic, QoS::AtMostOnce))
            .collect();
        self.subscribe_many(filters).await
    }
}

pub fn mqtt_options(settings: &StreamSettings) -> MqttOptions {
    let mut opts = match settings.transport {
        BrokerTransport::Tcp => MqttOptions::new(&settings.client_id, &settings.host, settings.port),
        BrokerTransport::Ws => {
            let url = format!("ws://{}:{}{}", settings.host, settings.port, settings.ws_path);
            let mut opts = MqttOptions::new(&settings.client_id, url, settings.port);
            opts.set_transport(Transport::Ws);
            opts
        }
        BrokerTransport::Wss => {
            let url = format!("wss://{}:{}{}", settings.host, settings.port, settings.ws_path);
            let mut opts = MqttOptions::new(&settings.client_id, url, settings.port);
            opts.set_transport(Transport::wss_with_default_config());
            opts
        }
    };
    opts.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS)));
    // Subscriptions are dropped with the session and re-issued on every ConnAck.
    opts.set_clean_session(true);
    opts
}

/// Apply one event-loop outcome to the adapter.
///
/// Every ConnAck re-issues the full subscription set. A transport error marks
/// the link disconnected and waits `delay` before the caller polls again,
/// which reconnects.
pub async fn handle_event<S>(
    adapter: &StreamAdapter,
    subscriber: &S,
    event: Result<Event, ConnectionError>,
    delay: Duration,
) where
    S: TopicSubscriber + ?Sized,
{
    match event {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
            tracing::info!("Connected to MQTT broker");
            adapter.on_link(LinkState::Connected);

            let topics = adapter.subscriptions();
            let count = topics.len();
            match subscriber.subscribe_all(topics).await {
                Ok(()) => tracing::info!("Subscribed to {} topics", count),
                Err(e) => tracing::error!("Failed to subscribe: {}", e),
            }
        }
        Ok(Event::Incoming(Packet::Publish(publish))) => {
            adapter.on_message(&publish.topic, &publish.payload);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("MQTT connection error: {}; reconnecting in {:?}", e, delay);
            adapter.on_link(LinkState::Disconnected);
            tokio::time::sleep(delay).await;
            adapter.on_link(LinkState::Connecting);
        }
    }
}

/// Run the broker connection forever.
pub async fn run_feed(adapter: Arc<StreamAdapter>, settings: StreamSettings) {
    let delay = settings.reconnect_delay();
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&settings), 64);

    tracing::info!("Connecting to MQTT broker {}:{}", settings.host, settings.port);
    adapter.on_link(LinkState::Connecting);

    loop {
        let event = eventloop.poll().await;
        handle_event(&adapter, &client, event, delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store_handle::StoreHandle;
    use crate::application::stream_service::TopicScheme;
    use crate::domain::store::TelemetryStore;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubscriber {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl TopicSubscriber for RecordingSubscriber {
        async fn subscribe_all(&self, topics: Vec<String>) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(topics);
            Ok(())
        }
    }

    fn adapter() -> (StreamAdapter, StoreHandle) {
        let store = StoreHandle::new(TelemetryStore::new(50));
        let adapter = StreamAdapter::new(
            store.clone(),
            TopicScheme::new("sensegrid"),
            vec!["LR1".into(), "LR2".into()],
            vec!["CT1".into()],
        );
        (adapter, store)
    }

    fn conn_ack() -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        })))
    }

    fn dropped() -> Result<Event, ConnectionError> {
        Err(ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }

    #[test]
    fn test_tcp_options() {
        let settings = StreamSettings {
            client_id: "dash-1".into(),
            keep_alive_secs: 1,
            ..StreamSettings::default()
        };
        let opts = mqtt_options(&settings);
        assert_eq!(opts.broker_address(), ("broker.hivemq.com".to_string(), 1883));
        assert_eq!(opts.client_id(), "dash-1");
        assert_eq!(opts.keep_alive(), Duration::from_secs(MIN_KEEP_ALIVE_SECS));
        assert!(opts.clean_session());
    }

    #[test]
    fn test_websocket_options() {
        let settings = StreamSettings {
            host: "broker.hivemq.com".into(),
            port: 8884,
            transport: BrokerTransport::Ws,
            ..StreamSettings::default()
        };
        let opts = mqtt_options(&settings);
        assert_eq!(opts.broker_address().0, "ws://broker.hivemq.com:8884/mqtt");
    }

    #[test]
    fn test_secure_websocket_options() {
        let settings = StreamSettings {
            host: "broker.hivemq.com".into(),
            port: 8884,
            transport: BrokerTransport::Wss,
            ..StreamSettings::default()
        };
        let opts = mqtt_options(&settings);
        assert_eq!(opts.broker_address().0, "wss://broker.hivemq.com:8884/mqtt");
        assert!(matches!(opts.transport(), Transport::Wss(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_conn_ack_resubscribes_all_topics() {
        let (adapter, store) = adapter();
        let subscriber = RecordingSubscriber::default();
        let delay = Duration::from_secs(5);

        handle_event(&adapter, &subscriber, conn_ack(), delay).await;
        handle_event(&adapter, &subscriber, dropped(), delay).await;
        handle_event(&adapter, &subscriber, conn_ack(), delay).await;

        let calls = subscriber.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], adapter.subscriptions());
        assert_eq!(calls[1], adapter.subscriptions());
        assert_eq!(calls[1].len(), 4);
        assert_eq!(store.read(|s| s.view().link), Some(LinkState::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_error_waits_reconnect_delay() {
        let (adapter, store) = adapter();
        let adapter = Arc::new(adapter);
        let subscriber = Arc::new(RecordingSubscriber::default());
        let settings = StreamSettings {
            reconnect_secs: 5,
            ..StreamSettings::default()
        };
        let delay = settings.reconnect_delay();

        let started = tokio::time::Instant::now();
        let task = {
            let adapter = adapter.clone();
            let subscriber = subscriber.clone();
            tokio::spawn(async move { handle_event(&*adapter, &*subscriber, dropped(), delay).await })
        };

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(store.read(|s| s.view().link), Some(LinkState::Disconnected));

        task.await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(store.read(|s| s.view().link), Some(LinkState::Connecting));
        assert!(subscriber.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_is_ingested() {
        let (adapter, store) = adapter();
        let subscriber = RecordingSubscriber::default();
        let publish = Publish::new("sensegrid/LR2/sensors/CT1", QoS::AtMostOnce, br#"{"value": 3.5}"#.to_vec());

        handle_event(
            &adapter,
            &subscriber,
            Ok(Event::Incoming(Packet::Publish(publish))),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(store.read(|s| s.snapshot("LR2", "CT1")).unwrap().latest_value, Some(3.5));
    }
}
