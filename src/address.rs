use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::ShardError;

pub const DEFAULT_MASK_WIDTH: u8 = 8;

/// Parse a dotted-quad address into its integer form.
///
/// Anything other than four dot-separated octets in `[0, 255]` is a
/// `ShardErrorKind::Format` error.
pub fn to_int(address: &str) -> Result<u32, ShardError> {
    let addr: Ipv4Addr = address.trim().parse()?;
    Ok(u32::from(addr))
}

/// Keep the top `width` bits of `addr`. Widths above 32 are clamped.
pub fn mask(addr: u32, width: u8) -> u32 {
    match width.min(32) {
        0 => 0,
        w => addr & (u32::MAX << (32 - u32::from(w))),
    }
}

/// An IPv4 prefix of a fixed width; membership is `mask(addr, width) == prefix`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subnet {
    net: Ipv4Net,
}

impl Subnet {
    pub fn of(addr: u32, width: u8) -> Result<Subnet, ShardError> {
        let net = Ipv4Net::new(Ipv4Addr::from(addr), width)?.trunc();
        debug_assert!(u32::from(net.network()) == mask(addr, width));
        Ok(Subnet { net })
    }

    pub fn prefix(&self) -> u32 {
        u32::from(self.net.network())
    }

    pub fn width(&self) -> u8 {
        self.net.prefix_len()
    }

    pub fn matches(&self, addr: u32) -> bool {
        mask(addr, self.width()) == self.prefix()
    }

    /// Filename-safe rendering, e.g. `10-0-0-0_8`.
    pub fn file_tag(&self) -> String {
        self.to_string().replace('.', "-").replace('/', "_")
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.net.network(), self.width())
    }
}
