//! Static IP blacklist.

use std::collections::HashSet;
use std::net::{AddrParseError, IpAddr};

/// A fixed set of client addresses that are always refused.
#[derive(Debug, Clone, Default)]
pub struct IpBlacklist {
    addrs: HashSet<IpAddr>,
}

impl IpBlacklist {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    /// Build from textual addresses, failing on the first unparsable entry.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, AddrParseError> {
        let addrs = entries
            .iter()
            .map(|e| e.as_ref().trim().parse::<IpAddr>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(addrs))
    }

    /// True if `ip` is listed. IPv4-mapped IPv6 addresses match their IPv4
    /// entry.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.addrs.contains(&ip.to_canonical())
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}
