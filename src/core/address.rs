//! IPv4 subnet membership.
//!
//! A [`NetworkBinding`] is a `(network, netmask)` pair. Membership and
//! equality are always decided on masked integers, never on the textual
//! CIDR form, so `10.1.0.0/8` and `10.0.0.0/8` are the same binding.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::RecorderError;

/// A subnet defined by a network address and a netmask.
#[derive(Debug, Clone, Copy)]
pub struct NetworkBinding {
    network: Ipv4Addr,
    netmask: Ipv4Addr,
}

impl NetworkBinding {
    /// Build a binding from a raw network/netmask pair. The network does not
    /// need to be pre-masked.
    pub fn new(network: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { network, netmask }
    }

    /// Build a binding from a network and a prefix length (`/n`).
    pub fn from_prefix(network: Ipv4Addr, prefix_len: u8) -> Result<Self, RecorderError> {
        let netmask = netmask_from_prefix(prefix_len).ok_or_else(|| {
            RecorderError::InvalidInput(format!(
                "prefix length {prefix_len} is out of range (0-32)"
            ))
        })?;
        Ok(Self::new(network, netmask))
    }

    /// The masked network address.
    pub fn network(&self) -> Ipv4Addr {
        network_address(self.network, self.netmask)
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    pub fn matches(&self, address: Ipv4Addr) -> bool {
        matches(address, self)
    }
}

/// `address & netmask`.
pub fn network_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) & u32::from(netmask))
}

/// True when `address` lies inside `binding`. The netmask is applied to both
/// sides.
pub fn matches(address: Ipv4Addr, binding: &NetworkBinding) -> bool {
    network_address(address, binding.netmask) == binding.network()
}

/// True when `address` lies inside any of `bindings`.
pub fn matches_any(address: Ipv4Addr, bindings: &[NetworkBinding]) -> bool {
    bindings.iter().any(|b| b.matches(address))
}

/// Netmask for a prefix length, or `None` when the length exceeds 32.
pub fn netmask_from_prefix(prefix_len: u8) -> Option<Ipv4Addr> {
    if prefix_len > 32 {
        return None;
    }
    let bits = u32::MAX
        .checked_shl(32 - u32::from(prefix_len))
        .unwrap_or(0);
    Some(Ipv4Addr::from(bits))
}

impl PartialEq for NetworkBinding {
    fn eq(&self, other: &Self) -> bool {
        self.netmask == other.netmask && self.network() == other.network()
    }
}

impl Eq for NetworkBinding {}

impl Hash for NetworkBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network().hash(state);
        self.netmask.hash(state);
    }
}

/// Parses `a.b.c.d/n`.
impl FromStr for NetworkBinding {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            |detail: &str| RecorderError::InvalidInput(format!("invalid subnet `{s}`: {detail}"));

        let (network, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected `address/prefix`"))?;
        let network: Ipv4Addr = network
            .parse()
            .map_err(|_| invalid("bad IPv4 address"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| invalid("bad prefix length"))?;

        Self::from_prefix(network, prefix).map_err(|_| invalid("prefix length must be 0-32"))
    }
}

impl fmt::Display for NetworkBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.network(),
            u32::from(self.netmask).count_ones()
        )
    }
}
