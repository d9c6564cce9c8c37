//! Network identity lookups and TCP port probing.
//!
//! `HttpAddressResolver` finds the local outbound address from the interface
//! table and asks a plain-text echo service for the public one.
//! `TcpPortProbe` decides whether a port is being served on this host, trying
//! the IPv4 and IPv6 loopbacks first and then every other local interface
//! address, since a service bound to a single interface does not answer on
//! loopback.

use crate::config::NetworkConfig;
use crate::core::{AddressResolver, PortProbe};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum PublicIpError {
    #[error("public IP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("public IP service returned an invalid address: {0:?}")]
    InvalidAddress(String),
}

/// Resolves local and public addresses.
pub struct HttpAddressResolver {
    client: reqwest::Client,
    public_ip_url: String,
}

impl HttpAddressResolver {
    pub fn new(config: &NetworkConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            public_ip_url: config.public_ip_url.clone(),
        })
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    fn local_address(&self) -> Option<IpAddr> {
        match local_ip_address::local_ip() {
            Ok(ip) => Some(ip),
            Err(e) => {
                debug!(error = %e, "Could not determine local address");
                None
            }
        }
    }

    async fn public_address(&self) -> Result<IpAddr, PublicIpError> {
        let body = self
            .client
            .get(&self.public_ip_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let trimmed = body.trim();
        trimmed
            .parse()
            .map_err(|_| PublicIpError::InvalidAddress(trimmed.to_string()))
    }
}

/// Probes ports with short TCP connect attempts.
pub struct TcpPortProbe {
    timeout: Duration,
}

impl TcpPortProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(Duration::from_millis(config.port_probe_timeout_ms))
    }

    async fn try_connect(&self, addr: SocketAddr) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "Connect refused");
                false
            }
            Err(_) => {
                trace!(%addr, "Connect timed out");
                false
            }
        }
    }
}

fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Interface index used as the scope of a link-local address. Linux only.
fn interface_index(name: &str) -> Option<u32> {
    std::fs::read_to_string(format!("/sys/class/net/{name}/ifindex"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Socket addresses to try for a port probe: both loopbacks first, then every
/// interface address of the host. Link-local IPv6 addresses carry their
/// interface scope and are skipped when it cannot be determined.
fn candidate_addresses(
    port: u16,
    interfaces: impl IntoIterator<Item = (String, IpAddr)>,
) -> Vec<SocketAddr> {
    let mut candidates = vec![
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
        SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port),
    ];
    for (name, ip) in interfaces {
        let addr = match ip {
            IpAddr::V6(v6) if is_link_local(&v6) => match interface_index(&name) {
                Some(scope) => SocketAddr::V6(SocketAddrV6::new(v6, port, 0, scope)),
                None => {
                    trace!(interface = %name, %v6, "Skipping link-local address without scope");
                    continue;
                }
            },
            ip => SocketAddr::new(ip, port),
        };
        if !candidates.contains(&addr) {
            candidates.push(addr);
        }
    }
    candidates
}

fn local_interfaces() -> Vec<(String, IpAddr)> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!(error = %e, "Could not enumerate interface addresses");
            Vec::new()
        }
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_active(&self, port: u16) -> bool {
        for addr in candidate_addresses(port, local_interfaces()) {
            if self.try_connect(addr).await {
                return true;
            }
        }
        false
    }
}
