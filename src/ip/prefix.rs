//! Dotted-quad prefix parsing.
//!
//! Addresses of udp4 segment members are written as `a.b.c.d/len`. Each
//! octet must be in 0-255 and the prefix length in 0-32.

use regex::Regex;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

/// Errors that can occur while parsing a prefix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("'{0}' is not of the form a.b.c.d/len")]
    Malformed(String),
    #[error("octet {octet} in '{input}' is out of range 0-255")]
    OctetOutOfRange { input: String, octet: u32 },
    #[error("prefix length {len} in '{input}' is out of range 0-32")]
    LengthOutOfRange { input: String, len: u32 },
}

/// An interface address together with its prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Prefix {
    addr: Ipv4Addr,
    len: u8,
}

fn prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(\d+)/(\d+)$").expect("prefix regex is valid")
    })
}

impl Ipv4Prefix {
    /// The address without the prefix length, as written into `/etc/hosts`
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

impl FromStr for Ipv4Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = prefix_regex()
            .captures(s)
            .ok_or_else(|| PrefixError::Malformed(s.to_string()))?;

        // Captures are all digits, but may still overflow u32
        let field = |i: usize| -> Result<u32, PrefixError> {
            caps[i]
                .parse::<u32>()
                .map_err(|_| PrefixError::Malformed(s.to_string()))
        };

        let mut octets = [0u8; 4];
        for (slot, group) in octets.iter_mut().zip(1..=4) {
            let value = field(group)?;
            *slot = u8::try_from(value).map_err(|_| PrefixError::OctetOutOfRange {
                input: s.to_string(),
                octet: value,
            })?;
        }

        let len = field(5)?;
        if len > 32 {
            return Err(PrefixError::LengthOutOfRange { input: s.to_string(), len });
        }

        Ok(Self {
            addr: Ipv4Addr::from(octets),
            len: len as u8,
        })
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_prefixes() {
        let p: Ipv4Prefix = "10.0.0.1/24".parse().unwrap();
        assert_eq!(p.addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(p.to_string(), "10.0.0.1/24");

        let any: Ipv4Prefix = "0.0.0.0/0".parse().unwrap();
        assert_eq!(any.to_string(), "0.0.0.0/0");

        let host: Ipv4Prefix = "255.255.255.255/32".parse().unwrap();
        assert_eq!(host.addr(), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn test_invalid_prefixes() {
        assert!(matches!("10.0.0.1".parse::<Ipv4Prefix>(), Err(PrefixError::Malformed(_))));
        assert!(matches!("10.0.0/24".parse::<Ipv4Prefix>(), Err(PrefixError::Malformed(_))));
        assert!(matches!("a.b.c.d/8".parse::<Ipv4Prefix>(), Err(PrefixError::Malformed(_))));
        assert!(matches!(
            "10.0.256.1/24".parse::<Ipv4Prefix>(),
            Err(PrefixError::OctetOutOfRange { octet: 256, .. })
        ));
        assert!(matches!(
            "10.0.0.1/33".parse::<Ipv4Prefix>(),
            Err(PrefixError::LengthOutOfRange { len: 33, .. })
        ));
        assert!(matches!(
            "10.0.0.1/99999999999".parse::<Ipv4Prefix>(),
            Err(PrefixError::Malformed(_))
        ));
    }
}
