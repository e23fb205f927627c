//! Shared scalar types used across the view definition, codec, and the
//! external-collaborator interfaces (spec §3.1, §6.2, §6.3).

use std::fmt;

/// The semantic type of one view field (key or value column).
///
/// Mirrors `DataType` in the original `fdsdump` (`view.hpp`): a tagged
/// union discriminant, not a runtime tag stored per value — the schema
/// *is* the tag (spec §9, "Union-typed accumulator").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Tagged union: a length byte (4 or 16) followed by a 16-byte address,
    /// zero-padded. Used for `srcip`/`dstip`/`ip` (whichever address family
    /// the record actually carries).
    Ip,
    Ipv4,
    Ipv6,
    Mac,
    /// Milliseconds since the Unix epoch, stored as u64.
    DateTimeMs,
    /// Zero-padded fixed-width string.
    FixedString128,
}

impl DataType {
    /// The fixed byte width of this data type within a slot.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::Ipv4 => 4,
            Self::U64 | Self::I64 | Self::DateTimeMs => 8,
            Self::Ipv6 => 16,
            Self::Mac => 6,
            // 1 length byte + 16 address bytes, matching the original's
            // `IPAddress { uint8_t length; uint8_t address[16]; }`.
            Self::Ip => 17,
            Self::FixedString128 => 128,
        }
    }

    /// True for fields whose native representation is a signed integer.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// True for the two IP-bearing kinds that a subnet mask can apply to.
    #[must_use]
    pub const fn is_ip_like(self) -> bool {
        matches!(self, Self::Ip | Self::Ipv4 | Self::Ipv6)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Ip => "ip",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Mac => "mac",
            Self::DateTimeMs => "datetime_ms",
            Self::FixedString128 => "string128",
        };
        write!(f, "{label}")
    }
}

/// A decoded wire value, produced by the external IPFIX reader's field
/// lookup and consumed by the codec (spec §4.2). Untyped at the byte level;
/// the codec reinterprets it according to the view field's `DataType`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireValue {
    Unsigned(u64),
    Signed(i64),
    Ipv4([u8; 4]),
    Ipv6([u8; 16]),
    Mac([u8; 6]),
    DateTimeMs(u64),
    Bytes(Vec<u8>),
}

impl WireValue {
    /// Interpret this value as an unsigned integer, truncating/widening as
    /// needed. Used by `Sum`/`Count` accumulators which are always u64.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Signed(v) if *v >= 0 => Some(*v as u64),
            Self::DateTimeMs(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Signed(v) => Some(*v),
            Self::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}
