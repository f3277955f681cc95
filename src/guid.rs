use std::fmt::{self, Debug, Display};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Serializer};

/// A COM class identifier as it is laid out on the wire (16 bytes, mixed-endian).
///
/// Equality is byte-for-byte on the wire representation; class-table resolution depends on it.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Guid {
    bytes: [u8; 16],
}

impl Guid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Guid {
        Guid { bytes }
    }

    /// Build from the textual field values, `{data1-data2-data3-data4}`.
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Guid {
        let d1 = data1.to_le_bytes();
        let d2 = data2.to_le_bytes();
        let d3 = data3.to_le_bytes();
        Guid {
            bytes: [
                d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], data4[0], data4[1],
                data4[2], data4[3], data4[4], data4[5], data4[6], data4[7],
            ],
        }
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    pub fn data1(&self) -> u32 {
        LittleEndian::read_u32(&self.bytes[0..4])
    }

    pub fn data2(&self) -> u16 {
        LittleEndian::read_u16(&self.bytes[4..6])
    }

    pub fn data3(&self) -> u16 {
        LittleEndian::read_u16(&self.bytes[6..8])
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let d4 = &self.bytes[8..16];
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1(),
            self.data2(),
            self.data3(),
            d4[0],
            d4[1],
            d4[2],
            d4[3],
            d4[4],
            d4[5],
            d4[6],
            d4[7]
        )
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
