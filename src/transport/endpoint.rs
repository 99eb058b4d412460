// src/transport/endpoint.rs

use crate::error::TetherError;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Host used when an endpoint leaves it out.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// A TCP address to bind or connect to.
///
/// Built from a bare port, a `(port, host)` pair, or a `tcp://host:port` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
  host: String,
  port: u16,
}

impl Endpoint {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    let host = host.into();
    let host = if host.is_empty() { DEFAULT_HOST.to_string() } else { host };
    Self { host, port }
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn port(&self) -> u16 {
    self.port
  }

  /// `host:port`, suitable for tokio's address resolution.
  pub(crate) fn authority(&self) -> String {
    if self.host.contains(':') {
      format!("[{}]:{}", self.host, self.port)
    } else {
      format!("{}:{}", self.host, self.port)
    }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "tcp://{}", self.authority())
  }
}

impl From<u16> for Endpoint {
  fn from(port: u16) -> Self {
    Endpoint::new(DEFAULT_HOST, port)
  }
}

impl From<(u16, &str)> for Endpoint {
  fn from((port, host): (u16, &str)) -> Self {
    Endpoint::new(host, port)
  }
}

impl From<(u16, String)> for Endpoint {
  fn from((port, host): (u16, String)) -> Self {
    Endpoint::new(host, port)
  }
}

impl From<SocketAddr> for Endpoint {
  fn from(addr: SocketAddr) -> Self {
    Endpoint::new(addr.ip().to_string(), addr.port())
  }
}

impl FromStr for Endpoint {
  type Err = TetherError;

  /// Parses `scheme://host:port`. Any scheme is accepted; the transport is always TCP.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid_endpoint_err = || TetherError::InvalidEndpoint(s.to_string());

    if !s.contains("://") {
      return Err(invalid_endpoint_err());
    }
    let url = match url::Url::parse(s) {
      Ok(url) => url,
      Err(url::ParseError::EmptyHost) => {
        // "tcp://:3000"
        let with_host = s.replacen("://", &format!("://{}", DEFAULT_HOST), 1);
        url::Url::parse(&with_host).map_err(|_| invalid_endpoint_err())?
      }
      Err(e) => {
        tracing::debug!(endpoint = s, error = %e, "Failed to parse endpoint");
        return Err(invalid_endpoint_err());
      }
    };
    let port = url.port().ok_or_else(invalid_endpoint_err)?;
    let host = match url.host() {
      Some(url::Host::Ipv6(addr)) => addr.to_string(),
      Some(host) => host.to_string(),
      None => DEFAULT_HOST.to_string(),
    };
    Ok(Endpoint::new(host, port))
  }
}

impl TryFrom<&str> for Endpoint {
  type Error = TetherError;

  fn try_from(s: &str) -> Result<Self, Self::Error> {
    s.parse()
  }
}

impl TryFrom<String> for Endpoint {
  type Error = TetherError;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    s.parse()
  }
}

/// Anything `bind` and `connect` accept as an address.
pub trait IntoEndpoint {
  fn into_endpoint(self) -> Result<Endpoint, TetherError>;
}

impl IntoEndpoint for Endpoint {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(self)
  }
}

impl IntoEndpoint for &Endpoint {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(self.clone())
  }
}

impl IntoEndpoint for u16 {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(Endpoint::from(self))
  }
}

impl IntoEndpoint for (u16, &str) {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(Endpoint::from(self))
  }
}

impl IntoEndpoint for (u16, String) {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(Endpoint::from(self))
  }
}

impl IntoEndpoint for SocketAddr {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    Ok(Endpoint::from(self))
  }
}

impl IntoEndpoint for &str {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    self.parse()
  }
}

impl IntoEndpoint for String {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    self.parse()
  }
}

impl IntoEndpoint for &String {
  fn into_endpoint(self) -> Result<Endpoint, TetherError> {
    self.parse()
  }
}

/// Address family of a bound listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
  IPv4,
  IPv6,
}

/// The address a listening socket is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAddress {
  pub address: String,
  pub port: u16,
  pub family: AddressFamily,
  /// `tcp://address:port`
  pub string: String,
}

impl From<SocketAddr> for BoundAddress {
  fn from(addr: SocketAddr) -> Self {
    let family = if addr.is_ipv4() { AddressFamily::IPv4 } else { AddressFamily::IPv6 };
    Self {
      address: addr.ip().to_string(),
      port: addr.port(),
      family,
      string: format!("tcp://{}", addr),
    }
  }
}

impl fmt::Display for BoundAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.string)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn port_only_defaults_host() {
    let ep = Endpoint::from(3000);
    assert_eq!(ep.host(), "0.0.0.0");
    assert_eq!(ep.to_string(), "tcp://0.0.0.0:3000");
  }

  #[test]
  fn port_and_host_pair() {
    let ep = Endpoint::from((4000, "127.0.0.1"));
    assert_eq!(ep.authority(), "127.0.0.1:4000");
  }

  #[test]
  fn parses_urls() {
    let ep: Endpoint = "tcp://localhost:5555".parse().unwrap();
    assert_eq!(ep.host(), "localhost");
    assert_eq!(ep.port(), 5555);

    let ep: Endpoint = "tcp://:5556".parse().unwrap();
    assert_eq!(ep.host(), "0.0.0.0");
    assert_eq!(ep.port(), 5556);

    let ep: Endpoint = "tcp://[::1]:7000".parse().unwrap();
    assert_eq!(ep.host(), "::1");
    assert_eq!(ep.to_string(), "tcp://[::1]:7000");
  }

  #[test]
  fn rejects_bad_urls() {
    assert!(matches!("localhost:80".parse::<Endpoint>(), Err(TetherError::InvalidEndpoint(_))));
    assert!("tcp://localhost".parse::<Endpoint>().is_err());
    assert!("tcp://host:notaport".parse::<Endpoint>().is_err());
  }

  #[test]
  fn bound_address_string() {
    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    let bound = BoundAddress::from(addr);
    assert_eq!(bound.string, "tcp://127.0.0.1:9000");
    assert_eq!(bound.family, AddressFamily::IPv4);
    assert_eq!(bound.port, 9000);
  }
}
