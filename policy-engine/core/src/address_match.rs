use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::{fmt, net::IpAddr, str::FromStr};

/// Matches a client address against an IP literal or a CIDR block.
///
/// Literals are stored as single-address networks (`/32` or `/128`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddressMatch(IpNet);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid IP address or CIDR block: {0:?}")]
pub struct InvalidAddress(pub String);

// === impl AddressMatch ===

impl AddressMatch {
    #[inline]
    pub fn net(&self) -> IpNet {
        self.0
    }

    /// Returns true if the address falls within this block. Addresses of a
    /// different family never match.
    #[inline]
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.0.contains(addr)
    }
}

impl FromStr for AddressMatch {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            return s
                .parse::<IpNet>()
                .map(Self)
                .map_err(|_| InvalidAddress(s.to_string()));
        }

        s.parse::<IpAddr>()
            .map(Self::from)
            .map_err(|_| InvalidAddress(s.to_string()))
    }
}

impl From<IpAddr> for AddressMatch {
    fn from(addr: IpAddr) -> Self {
        Self(IpNet::from(addr))
    }
}

impl From<IpNet> for AddressMatch {
    fn from(net: IpNet) -> Self {
        Self(net)
    }
}

impl From<Ipv4Net> for AddressMatch {
    fn from(net: Ipv4Net) -> Self {
        Self(net.into())
    }
}

impl From<Ipv6Net> for AddressMatch {
    fn from(net: Ipv6Net) -> Self {
        Self(net.into())
    }
}

impl fmt::Display for AddressMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
