use serde::Serialize;

use crate::err::DeserializationResult;
use crate::utils::ByteCursor;

pub const RECORD_HEADER_SIZE: usize = 8;

/// Version nibble marking a record whose content is a sequence of child records.
pub const CONTAINER_VERSION: u8 = 0xF;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum RecordType {
    SpContainer,
    Fspgr,
    Fsp,
    Fopt,
    ChildAnchor,
    ClientAnchor,
    Fbse,
    SecondaryFopt,
    TertiaryFopt,
    BlipEmf,
    BlipWmf,
    BlipPict,
    BlipJpeg,
    BlipPng,
    BlipDib,
    BlipTiff,
    BlipJpegCmyk,
    Other(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            0xF004 => RecordType::SpContainer,
            0xF009 => RecordType::Fspgr,
            0xF00A => RecordType::Fsp,
            0xF00B => RecordType::Fopt,
            0xF00F => RecordType::ChildAnchor,
            0xF010 => RecordType::ClientAnchor,
            0xF007 => RecordType::Fbse,
            0xF121 => RecordType::SecondaryFopt,
            0xF122 => RecordType::TertiaryFopt,
            0xF01A => RecordType::BlipEmf,
            0xF01B => RecordType::BlipWmf,
            0xF01C => RecordType::BlipPict,
            0xF01D => RecordType::BlipJpeg,
            0xF01E => RecordType::BlipPng,
            0xF01F => RecordType::BlipDib,
            0xF029 => RecordType::BlipTiff,
            0xF02A => RecordType::BlipJpegCmyk,
            other => RecordType::Other(other),
        }
    }
}

/// The 8 byte header in front of every drawing record.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RecordHeader {
    pub version: u8,
    pub instance: u16,
    pub record_type: u16,
    /// Number of bytes following the header that belong to the record.
    pub length: u32,
}

impl RecordHeader {
    pub(crate) fn from_cursor(cursor: &mut ByteCursor) -> DeserializationResult<RecordHeader> {
        let version_and_instance = cursor.u16_named("record header version/instance")?;
        let record_type = cursor.u16_named("record header type")?;
        let length = cursor.u32_named("record header length")?;

        Ok(RecordHeader {
            version: (version_and_instance & 0x000F) as u8,
            instance: (version_and_instance & 0xFFF0) >> 4,
            record_type,
            length,
        })
    }

    pub fn kind(&self) -> RecordType {
        RecordType::from(self.record_type)
    }

    pub fn is_container(&self) -> bool {
        self.version == CONTAINER_VERSION
    }

    /// Absolute end of the record content for a header that started at `header_start`.
    ///
    /// Saturates rather than wrapping; callers clamp the result to their own boundary.
    pub fn content_end(&self, header_start: usize) -> usize {
        header_start
            .saturating_add(RECORD_HEADER_SIZE)
            .saturating_add(self.length as usize)
    }
}
