//! MariaDB/MySQL client capability flags.
//!
//! The flags are sent by the client in the handshake response. The server only enables a
//! capability for the session when the client asks for it, so a flag that is never sent is
//! never negotiated.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde_derive::Deserialize;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct CapabilityFlags(u32);

impl CapabilityFlags {
    pub const CLIENT_LONG_PASSWORD: Self = Self(1);
    pub const CLIENT_FOUND_ROWS: Self = Self(1 << 1);
    pub const CLIENT_LONG_FLAG: Self = Self(1 << 2);
    pub const CLIENT_CONNECT_WITH_DB: Self = Self(1 << 3);
    pub const CLIENT_COMPRESS: Self = Self(1 << 5);
    pub const CLIENT_LOCAL_FILES: Self = Self(1 << 7);
    pub const CLIENT_PROTOCOL_41: Self = Self(1 << 9);
    pub const CLIENT_INTERACTIVE: Self = Self(1 << 10);
    pub const CLIENT_SSL: Self = Self(1 << 11);
    pub const CLIENT_TRANSACTIONS: Self = Self(1 << 13);
    pub const CLIENT_SECURE_CONNECTION: Self = Self(1 << 15);
    /// Allows several `;`-separated statements in one `COM_QUERY`.
    pub const CLIENT_MULTI_STATEMENTS: Self = Self(1 << 16);
    pub const CLIENT_MULTI_RESULTS: Self = Self(1 << 17);
    pub const CLIENT_PS_MULTI_RESULTS: Self = Self(1 << 18);
    pub const CLIENT_PLUGIN_AUTH: Self = Self(1 << 19);
    pub const CLIENT_CONNECT_ATTRS: Self = Self(1 << 20);
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: Self = Self(1 << 21);
    pub const CLIENT_SESSION_TRACK: Self = Self(1 << 23);
    pub const CLIENT_DEPRECATE_EOF: Self = Self(1 << 24);

    /// The flag set a stock async driver requests. Note that it includes
    /// `CLIENT_MULTI_STATEMENTS`.
    pub const DRIVER_DEFAULT: Self = Self(
        Self::CLIENT_LONG_PASSWORD.0
            | Self::CLIENT_LONG_FLAG.0
            | Self::CLIENT_PROTOCOL_41.0
            | Self::CLIENT_TRANSACTIONS.0
            | Self::CLIENT_SECURE_CONNECTION.0
            | Self::CLIENT_MULTI_STATEMENTS.0
            | Self::CLIENT_MULTI_RESULTS.0
            | Self::CLIENT_PLUGIN_AUTH.0
            | Self::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA.0
            | Self::CLIENT_CONNECT_ATTRS.0,
    );

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn allows_multi_statements(self) -> bool {
        self.contains(Self::CLIENT_MULTI_STATEMENTS)
    }
}

impl BitOr for CapabilityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CapabilityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CapabilityFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for CapabilityFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityFlags(0x{:08x})", self.0)
    }
}

impl From<u32> for CapabilityFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}
