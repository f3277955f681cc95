//! Reconstruction of embedded images from file-blip-storage-entry (FBSE) records.
//!
//! An FBSE carries a fixed 36 byte prefix, an optional UTF-16 name, and then the BLIP itself as
//! a nested record. The nested record type selects one of two envelope layouts:
//!
//! - metafiles (EMF, WMF, PICT): one or two digests, a 34 byte metafile header, then the
//!   (usually deflate-compressed) metafile bytes.
//! - rasters (JPEG, PNG, DIB, TIFF): one or two digests, a tag byte, then the file bytes verbatim.
//!
//! Whether the second digest is present depends on the BLIP record instance.

#[cfg(feature = "inflate")]
use std::borrow::Cow;

use log::{debug, warn};
use serde::{Serialize, Serializer};

use crate::err::{DeserializationError, DeserializationResult};
use crate::officeart::record_header::{RECORD_HEADER_SIZE, RecordHeader, RecordType};
use crate::settings::{ExtractionSettings, SecondaryDigest};
use crate::utils::{ByteCursor, decode_utf16le_lossy_z};

/// Fixed bytes counted by a metafile BLIP's length besides the payload: digest and header.
pub const METAFILE_OVERHEAD: usize = 50;
/// Fixed bytes counted by a raster BLIP's length besides the payload: digest and tag.
pub const RASTER_OVERHEAD: usize = 17;

pub const METAFILE_SECOND_DIGEST_INSTANCES: [u16; 3] = [0x217, 0x3D5, 0x543];
pub const RASTER_SECOND_DIGEST_INSTANCES: [u16; 5] = [0x46B, 0x6E1, 0x6E3, 0x6E5, 0x7A9];

pub const METAFILE_HEADER_SIZE: usize = 34;
pub const FBSE_FIXED_SIZE: usize = 36;

pub const COMPRESSION_DEFLATE: u8 = 0x00;
pub const COMPRESSION_NONE: u8 = 0xFE;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum BlipKind {
    Metafile,
    Raster,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum BlipSubtype {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Tiff,
}

impl BlipSubtype {
    /// Maps a BLIP record type code to its family and subtype.
    pub fn from_record_type(record_type: u16) -> Option<(BlipKind, BlipSubtype)> {
        match RecordType::from(record_type) {
            RecordType::BlipEmf => Some((BlipKind::Metafile, BlipSubtype::Emf)),
            RecordType::BlipWmf => Some((BlipKind::Metafile, BlipSubtype::Wmf)),
            RecordType::BlipPict => Some((BlipKind::Metafile, BlipSubtype::Pict)),
            RecordType::BlipJpeg | RecordType::BlipJpegCmyk => {
                Some((BlipKind::Raster, BlipSubtype::Jpeg))
            }
            RecordType::BlipPng => Some((BlipKind::Raster, BlipSubtype::Png)),
            RecordType::BlipDib => Some((BlipKind::Raster, BlipSubtype::Dib)),
            RecordType::BlipTiff => Some((BlipKind::Raster, BlipSubtype::Tiff)),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            BlipSubtype::Emf => "emf",
            BlipSubtype::Wmf => "wmf",
            BlipSubtype::Pict => "pict",
            BlipSubtype::Jpeg => "jpg",
            BlipSubtype::Png => "png",
            BlipSubtype::Dib => "dib",
            BlipSubtype::Tiff => "tiff",
        }
    }
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    serializer.serialize_str(&s)
}

fn serialize_len<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}

/// The fixed part of an FBSE record.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct BlipStoreEntry {
    pub win32_type: u8,
    pub mac_type: u8,
    #[serde(serialize_with = "serialize_hex")]
    pub digest: [u8; 16],
    pub tag: u16,
    pub size: u32,
    pub ref_count: u32,
    pub delay_offset: u32,
    pub name: Option<String>,
}

impl BlipStoreEntry {
    pub(crate) fn from_cursor(cursor: &mut ByteCursor) -> DeserializationResult<BlipStoreEntry> {
        let win32_type = cursor.u8_named("FBSE.btWin32")?;
        let mac_type = cursor.u8_named("FBSE.btMacOS")?;
        let digest = cursor.array::<16>("FBSE.rgbUid")?;
        let tag = cursor.u16_named("FBSE.tag")?;
        let size = cursor.u32_named("FBSE.size")?;
        let ref_count = cursor.u32_named("FBSE.cRef")?;
        let delay_offset = cursor.u32_named("FBSE.foDelay")?;
        cursor.advance(1, "FBSE.unused1")?;
        let name_len = cursor.u8_named("FBSE.cbName")?;
        cursor.advance(2, "FBSE.unused2/3")?;

        let name = if name_len > 0 {
            let bytes = cursor.take_bytes(usize::from(name_len), "FBSE.nameData")?;
            Some(decode_utf16le_lossy_z(bytes))
        } else {
            None
        };

        Ok(BlipStoreEntry {
            win32_type,
            mac_type,
            digest,
            tag,
            size,
            ref_count,
            delay_offset,
            name,
        })
    }
}

/// The 34 byte header in front of metafile BLIP data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct MetafileHeader {
    pub uncompressed_size: u32,
    /// left, top, right, bottom
    pub bounds: [i32; 4],
    /// Size in EMUs, x then y.
    pub size: [i32; 2],
    pub compressed_size: u32,
    pub compression: u8,
    pub filter: u8,
}

impl MetafileHeader {
    pub(crate) fn from_cursor(cursor: &mut ByteCursor) -> DeserializationResult<MetafileHeader> {
        let uncompressed_size = cursor.u32_named("metafile cbSize")?;
        let bounds = [
            cursor.i32_named("metafile rcBounds.left")?,
            cursor.i32_named("metafile rcBounds.top")?,
            cursor.i32_named("metafile rcBounds.right")?,
            cursor.i32_named("metafile rcBounds.bottom")?,
        ];
        let size = [
            cursor.i32_named("metafile ptSize.x")?,
            cursor.i32_named("metafile ptSize.y")?,
        ];
        let compressed_size = cursor.u32_named("metafile cbSave")?;
        let compression = cursor.u8_named("metafile compression")?;
        let filter = cursor.u8_named("metafile filter")?;

        Ok(MetafileHeader {
            uncompressed_size,
            bounds,
            size,
            compressed_size,
            compression,
            filter,
        })
    }
}

/// One embedded image recovered from the graphics stream.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ImageRecord {
    pub kind: BlipKind,
    pub subtype: BlipSubtype,
    /// The 12 bit instance of the BLIP record.
    pub instance: u16,
    #[serde(rename = "payload_size", serialize_with = "serialize_len")]
    pub payload: Vec<u8>,
    /// Whether `payload` is deflate-compressed (metafiles only).
    pub compressed: bool,
    #[serde(serialize_with = "serialize_hex")]
    pub digest: [u8; 16],
    #[serde(serialize_with = "serialize_hex")]
    pub secondary_digest: Vec<u8>,
    pub metafile: Option<MetafileHeader>,
    pub fbse: BlipStoreEntry,
    pub picture_name: Option<String>,
    /// Offset of the BLIP record header within the stream.
    pub stream_offset: u64,
}

impl ImageRecord {
    /// The payload inflated from zlib when it is compressed, the stored bytes otherwise.
    ///
    /// Output is capped at the uncompressed size the metafile header declares.
    #[cfg(feature = "inflate")]
    pub fn decompressed(&self) -> DeserializationResult<Cow<'_, [u8]>> {
        if !self.compressed {
            return Ok(Cow::Borrowed(&self.payload));
        }

        let limit = self
            .metafile
            .map(|m| m.uncompressed_size as usize)
            .unwrap_or(usize::MAX);

        miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(&self.payload, limit)
            .map(Cow::Owned)
            .map_err(|e| {
                DeserializationError::schema(
                    "metafile payload",
                    self.stream_offset as usize,
                    format!("inflate failed: {:?}", e.status),
                )
            })
    }
}

struct Envelope {
    digest: [u8; 16],
    secondary_digest: Vec<u8>,
    metafile: Option<MetafileHeader>,
    payload: Vec<u8>,
    compressed: bool,
}

fn payload_length(
    header: &RecordHeader,
    overhead: usize,
    digest_width: usize,
    offset: usize,
) -> DeserializationResult<usize> {
    (header.length as usize)
        .checked_sub(overhead)
        .and_then(|len| len.checked_sub(digest_width))
        .ok_or_else(|| {
            DeserializationError::schema(
                "BLIP record length",
                offset,
                format!(
                    "declared length {} is smaller than the {} byte envelope",
                    header.length,
                    overhead + digest_width
                ),
            )
        })
}

fn read_metafile(
    cursor: &mut ByteCursor,
    header: &RecordHeader,
    second_digest: SecondaryDigest,
    offset: usize,
) -> DeserializationResult<Envelope> {
    let digest_width = if METAFILE_SECOND_DIGEST_INSTANCES.contains(&header.instance) {
        second_digest.width()
    } else {
        0
    };
    let len = payload_length(header, METAFILE_OVERHEAD, digest_width, offset)?;

    let digest = cursor.array::<16>("metafile rgbUid1")?;
    let secondary_digest = cursor.take_bytes(digest_width, "metafile rgbUid2")?.to_vec();
    let metafile = MetafileHeader::from_cursor(cursor)?;

    if metafile.compressed_size as usize != len {
        warn!(
            "metafile BLIP at {}: cbSave is {} but the record leaves {} bytes, using the record length",
            offset, metafile.compressed_size, len
        );
    }

    let payload = cursor.take_bytes(len, "metafile data")?.to_vec();

    Ok(Envelope {
        digest,
        secondary_digest,
        metafile: Some(metafile),
        payload,
        compressed: metafile.compression == COMPRESSION_DEFLATE,
    })
}

fn read_raster(
    cursor: &mut ByteCursor,
    header: &RecordHeader,
    offset: usize,
) -> DeserializationResult<Envelope> {
    let digest_width = if RASTER_SECOND_DIGEST_INSTANCES.contains(&header.instance) {
        16
    } else {
        0
    };
    let len = payload_length(header, RASTER_OVERHEAD, digest_width, offset)?;

    let digest = cursor.array::<16>("raster rgbUid1")?;
    let secondary_digest = cursor.take_bytes(digest_width, "raster rgbUid2")?.to_vec();
    let _tag = cursor.u8_named("raster tag")?;
    let payload = cursor.take_bytes(len, "raster data")?.to_vec();

    Ok(Envelope {
        digest,
        secondary_digest,
        metafile: None,
        payload,
        compressed: false,
    })
}

/// Reconstructs the image carried by one FBSE record.
///
/// `cursor` must be positioned at the FBSE content and bounded to its declared end. Returns
/// `Ok(None)` when the entry does not embed its BLIP (the data lives in the delay stream).
pub(crate) fn read_blip_store_entry(
    cursor: &mut ByteCursor,
    settings: &ExtractionSettings,
    picture_name: Option<&str>,
) -> DeserializationResult<Option<ImageRecord>> {
    let fbse = BlipStoreEntry::from_cursor(cursor)?;

    if cursor.remaining() < RECORD_HEADER_SIZE {
        debug!(
            "FBSE ending at {} has no embedded BLIP (foDelay {:#x})",
            cursor.len(),
            fbse.delay_offset
        );
        return Ok(None);
    }

    let blip_offset = cursor.pos();
    let header = RecordHeader::from_cursor(cursor)?;
    let Some((kind, subtype)) = BlipSubtype::from_record_type(header.record_type) else {
        return Err(DeserializationError::schema(
            "BLIP record type",
            blip_offset,
            format!("{:#06x} is not an image record", header.record_type),
        ));
    };

    debug!(
        "{:?} BLIP at {}: instance {:#x}, {} bytes",
        subtype, blip_offset, header.instance, header.length
    );

    let mut blip = cursor.bounded(header.content_end(blip_offset));
    let envelope = match kind {
        BlipKind::Metafile => read_metafile(
            &mut blip,
            &header,
            settings.get_metafile_digest(),
            blip_offset,
        )?,
        BlipKind::Raster => read_raster(&mut blip, &header, blip_offset)?,
    };

    Ok(Some(ImageRecord {
        kind,
        subtype,
        instance: header.instance,
        payload: envelope.payload,
        compressed: envelope.compressed,
        digest: envelope.digest,
        secondary_digest: envelope.secondary_digest,
        metafile: envelope.metafile,
        fbse,
        picture_name: picture_name.map(str::to_owned),
        stream_offset: blip_offset as u64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fbse_prefix(name: &[u8]) -> Vec<u8> {
        let mut out = vec![5, 5];
        out.extend_from_slice(&[0xAA; 16]);
        out.extend_from_slice(&0x00FFu16.to_le_bytes());
        out.extend_from_slice(&100u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(0);
        out.push(name.len() as u8);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(name);
        out
    }

    fn blip_header(instance: u16, record_type: u16, length: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(instance << 4).to_le_bytes());
        out.extend_from_slice(&record_type.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out
    }

    #[test]
    fn test_reads_png_with_single_digest() {
        let payload = b"\x89PNG\r\n\x1a\nrest";
        let mut data = fbse_prefix(b"");
        data.extend(blip_header(0x6E0, 0xF01E, (RASTER_OVERHEAD + payload.len()) as u32));
        data.extend_from_slice(&[0x11; 16]);
        data.push(0xFF);
        data.extend_from_slice(payload);

        let image = read_blip_store_entry(
            &mut ByteCursor::new(&data),
            &ExtractionSettings::default(),
            None,
        )
        .unwrap()
        .expect("embedded blip");

        assert_eq!(image.kind, BlipKind::Raster);
        assert_eq!(image.subtype, BlipSubtype::Png);
        assert_eq!(image.payload, payload.to_vec());
        assert_eq!(image.digest, [0x11; 16]);
        assert!(image.secondary_digest.is_empty());
        assert_eq!(image.stream_offset, FBSE_FIXED_SIZE as u64);
        assert_eq!(image.fbse.ref_count, 1);
        assert!(!image.compressed);
    }

    #[test]
    fn test_reads_fbse_name() {
        let mut data = fbse_prefix(b"a\x00b\x00\x00\x00");
        data.extend(blip_header(0x7A8, 0xF01F, RASTER_OVERHEAD as u32));
        data.extend_from_slice(&[0; 17]);

        let image = read_blip_store_entry(
            &mut ByteCursor::new(&data),
            &ExtractionSettings::default(),
            Some("pic"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(image.fbse.name.as_deref(), Some("ab"));
        assert_eq!(image.picture_name.as_deref(), Some("pic"));
        assert!(image.payload.is_empty());
    }

    #[test]
    fn test_entry_without_embedded_blip() {
        let data = fbse_prefix(b"");
        assert_eq!(
            read_blip_store_entry(
                &mut ByteCursor::new(&data),
                &ExtractionSettings::default(),
                None
            )
            .unwrap(),
            None
        );
    }

    #[test]
    fn test_stored_metafile_reports_uncompressed() {
        let payload = [0x01u8, 0x00, 0x09, 0x00];
        let mut data = fbse_prefix(b"");
        data.extend(blip_header(0x216, 0xF01B, (METAFILE_OVERHEAD + payload.len()) as u32));
        data.extend_from_slice(&[0x22; 16]);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0; 24]);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.push(COMPRESSION_NONE);
        data.push(0xFE);
        data.extend_from_slice(&payload);

        let image = read_blip_store_entry(
            &mut ByteCursor::new(&data),
            &ExtractionSettings::default(),
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(image.subtype, BlipSubtype::Wmf);
        assert!(!image.compressed);
        assert_eq!(image.metafile.unwrap().compressed_size, 4);
        assert_eq!(image.payload, payload.to_vec());
    }

    #[test]
    fn test_unknown_blip_type_is_schema_violation() {
        let mut data = fbse_prefix(b"");
        data.extend(blip_header(0, 0xF00B, 0));
        let err = read_blip_store_entry(
            &mut ByteCursor::new(&data),
            &ExtractionSettings::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DeserializationError::SchemaViolation { .. }));
    }

    #[test]
    fn test_serializes_payload_as_length() {
        let mut data = fbse_prefix(b"");
        data.extend(blip_header(0x46A, 0xF01D, (RASTER_OVERHEAD + 3) as u32));
        data.extend_from_slice(&[0x0F; 16]);
        data.push(0xFF);
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF]);

        let image = read_blip_store_entry(
            &mut ByteCursor::new(&data),
            &ExtractionSettings::default(),
            None,
        )
        .unwrap()
        .unwrap();
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["payload_size"], 3);
        assert_eq!(value["subtype"], "Jpeg");
        assert_eq!(value["digest"], "0f".repeat(16));
    }
}
