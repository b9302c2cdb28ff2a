use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid broker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unsupported broker scheme '{0}' (expected mqtt, tcp, mqtts, ssl or tls)")]
    UnsupportedScheme(String),

    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("cannot publish to wildcard topic '{0}'")]
    InvalidPublishTopic(String),

    #[error("failed to encode payload for topic '{topic}': {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}

impl BusError {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        BusError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}
