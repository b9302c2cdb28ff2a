use crate::test_config::*;
use mqtt_event_bus::mqtt::Scheme;
use mqtt_event_bus::{BrokerAddress, BusError, EventBus, EventBusConfig};

#[test]
fn test_address_forms() {
    let cases = [
        ("mqtt://localhost", Scheme::Tcp, "localhost", 1883),
        ("tcp://10.1.2.3:1885", Scheme::Tcp, "10.1.2.3", 1885),
        ("MQTT://Broker.Local:1883", Scheme::Tcp, "Broker.Local", 1883),
        ("mqtts://secure.example.com", Scheme::Tls, "secure.example.com", 8883),
        ("tls://secure.example.com:9883", Scheme::Tls, "secure.example.com", 9883),
        ("broker.lan:2883", Scheme::Tcp, "broker.lan", 2883),
        ("  mqtt://padded:1883  ", Scheme::Tcp, "padded", 1883),
    ];

    for (input, scheme, host, port) in cases {
        let address = BrokerAddress::parse(input).unwrap();
        assert_eq!(address.scheme, scheme, "input: {}", input);
        assert_eq!(address.host, host, "input: {}", input);
        assert_eq!(address.port, port, "input: {}", input);
    }
}

#[test]
fn test_websocket_schemes_rejected() {
    for input in ["ws://broker:8080", "wss://broker:443", "http://broker"] {
        assert!(
            matches!(BrokerAddress::parse(input), Err(BusError::UnsupportedScheme(_))),
            "input: {}",
            input
        );
    }
}

#[test]
fn test_error_messages_name_the_address() {
    let error = BrokerAddress::parse("mqtt://broker:99999").unwrap_err();
    let message = error.to_string();
    assert!(message.contains("mqtt://broker:99999"));
    assert!(message.contains("port"));
}

#[tokio::test]
async fn test_connect_uses_config_settings() {
    let mut config = EventBusConfig::for_address(TEST_BROKER_ADDRESS);
    config.broker.client_id = Some("integration-bus".to_string());

    let (bus, _event_loop) = EventBus::connect_with_config(&config).unwrap();
    assert!(bus.subscribed_topics().is_empty());

    config.broker.address = "ws://localhost".to_string();
    assert!(EventBus::connect_with_config(&config).is_err());
}
