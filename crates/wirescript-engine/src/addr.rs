//! Network addresses attached to packets and tree items.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Address family tag. The numeric values cross the script boundary as
/// plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum AddressType {
    None = 0,
    Ipv4 = 1,
    Ipv6 = 2,
}

/// A concrete network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
}

impl Address {
    pub fn kind(&self) -> AddressType {
        match self {
            Address::Ipv4(_) => AddressType::Ipv4,
            Address::Ipv6(_) => AddressType::Ipv6,
        }
    }

    /// The raw network-order bytes of the address.
    pub fn pack(&self) -> Bytes {
        match self {
            Address::Ipv4(ip) => Bytes::copy_from_slice(&ip.octets()),
            Address::Ipv6(ip) => Bytes::copy_from_slice(&ip.octets()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => ip.fmt(f),
            Address::Ipv6(ip) => ip.fmt(f),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Address::Ipv4(ip)
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Address::Ipv6(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_pack() {
        let a = Address::Ipv4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(a.to_string(), "10.0.0.1");
        assert_eq!(a.pack().as_ref(), &[10, 0, 0, 1]);
        assert_eq!(a.kind(), AddressType::Ipv4);
    }

    #[test]
    fn type_tag_round_trips() {
        assert_eq!(u32::from(AddressType::Ipv6), 2);
        assert_eq!(AddressType::try_from(1u32).unwrap(), AddressType::Ipv4);
        assert!(AddressType::try_from(7u32).is_err());
    }
}
