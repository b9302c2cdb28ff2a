use crate::error::BusError;
use rumqttc::{MqttOptions, Transport};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TCP_PORT: u16 = 1883;
pub const DEFAULT_TLS_PORT: u16 = 8883;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Tcp,
    Tls,
}

impl Scheme {
    fn parse(scheme: &str) -> Result<Self, BusError> {
        match scheme.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => Ok(Scheme::Tcp),
            "mqtts" | "ssl" | "tls" => Ok(Scheme::Tls),
            _ => Err(BusError::UnsupportedScheme(scheme.to_string())),
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Tcp => DEFAULT_TCP_PORT,
            Scheme::Tls => DEFAULT_TLS_PORT,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Tcp => "mqtt",
            Scheme::Tls => "mqtts",
        }
    }
}

/// Broker location parsed from strings like `mqtt://broker.local:1883`,
/// `mqtts://broker.example.com` or a bare `localhost:1883`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn parse(address: &str) -> Result<Self, BusError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(BusError::invalid_address(address, "address is empty"));
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (Scheme::parse(scheme)?, rest),
            None => (Scheme::Tcp, trimmed),
        };

        // Anything after the authority (path, query) carries no meaning for MQTT
        let authority = rest
            .split(|c: char| c == '/' || c == '?' || c == '#')
            .next()
            .unwrap_or_default();

        if authority.contains('@') {
            return Err(BusError::invalid_address(
                address,
                "credentials in the address are not supported",
            ));
        }

        let (host, port) = split_host_port(authority)
            .map_err(|reason| BusError::invalid_address(address, reason))?;

        if host.is_empty() {
            return Err(BusError::invalid_address(address, "host is empty"));
        }

        let port = match port {
            Some(port) => port,
            None => scheme.default_port(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Tls
    }

    /// Base client options for this address. Callers layer keep-alive and
    /// session settings on top.
    pub fn mqtt_options(&self, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        if self.is_tls() {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>), &'static str> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or("unterminated IPv6 literal")?;
        return match after {
            "" => Ok((host, None)),
            _ => {
                let port = after
                    .strip_prefix(':')
                    .ok_or("unexpected characters after IPv6 literal")?;
                Ok((host, Some(parse_port(port)?)))
            }
        };
    }

    match authority.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => Err("IPv6 literals must be enclosed in brackets"),
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((authority, None)),
    }
}

fn parse_port(port: &str) -> Result<u16, &'static str> {
    match port.parse::<u16>() {
        Ok(0) => Err("port cannot be zero"),
        Ok(port) => Ok(port),
        Err(_) => Err("port is not a valid number"),
    }
}

impl FromStr for BrokerAddress {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme.as_str(), self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
        }
    }
}
