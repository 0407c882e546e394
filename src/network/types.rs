use crate::error::ClusterError;
use crate::membership::types::GossipMessage;
use crate::storage::protocol::KvMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// Node identifier on the network.
///
/// An empty host marks an in-process address; over UDP it resolves to loopback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// In-process address, identified by port alone.
    pub fn local(port: u16) -> Self {
        Self::new(String::new(), port)
    }

    pub fn is_local(&self) -> bool {
        self.host.is_empty()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ClusterError> {
        if self.is_local() {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port));
        }
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ClusterError::MalformedInput(format!("unresolvable address {}", self)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClusterError::MalformedInput(format!("missing port in '{}'", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| ClusterError::MalformedInput(format!("bad port in '{}': {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Exactly one protocol message, as carried by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Gossip(GossipMessage),
    Kv(KvMessage),
}

impl Payload {
    pub fn as_gossip(&self) -> Option<&GossipMessage> {
        match self {
            Payload::Gossip(message) => Some(message),
            Payload::Kv(_) => None,
        }
    }

    pub fn as_kv(&self) -> Option<&KvMessage> {
        match self {
            Payload::Kv(message) => Some(message),
            Payload::Gossip(_) => None,
        }
    }
}

impl From<GossipMessage> for Payload {
    fn from(message: GossipMessage) -> Self {
        Payload::Gossip(message)
    }
}

impl From<KvMessage> for Payload {
    fn from(message: KvMessage) -> Self {
        Payload::Kv(message)
    }
}
