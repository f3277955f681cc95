//! Table-driven decoding of custom control property blocks.
//!
//! Custom controls persist their properties as a fixed sequence of fields with no tags, so a
//! control is described by an ordered `&[FieldSpec]` and a single loop walks it. Each field has a
//! wire type (how many bytes, how they are read) and a semantic kind (what the value means).

use encoding::EncodingRef;
use log::{debug, trace};
use memchr::memmem;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::err::{DeserializationError, DeserializationResult};
use crate::forms::stream::FormStreamReader;
use crate::utils::{decode_ansi, decode_ansi_stripped, strip_nuls};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    I16,
    I32,
    U32,
    /// A fixed run of bytes with no numeric value.
    Raw(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticKind {
    Scalar,
    /// Stored as `value > 0`.
    Boolean,
    /// The value indexes this label list.
    Enum(&'static [&'static str]),
    /// The value printed as hexadecimal.
    Hex,
    /// The value is a byte count of NUL-padded single-byte text.
    Text,
    /// The value is a byte count of an opaque blob; zero means absent.
    Blob,
    /// The value is a byte count of a font description; the face name is stored under `name_key`.
    Font { name_key: &'static str },
    /// The value is a byte count of rich text; the first `\fs16` run is stored under `text_key`.
    RichText { text_key: &'static str },
    /// Read and discarded.
    Reserved,
}

/// One entry of a property block schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub wire: WireType,
    pub kind: SemanticKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, wire: WireType, kind: SemanticKind) -> FieldSpec {
        FieldSpec { name, wire, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Integer(i64),
    Boolean(bool),
    Label(&'static str),
    Hex(String),
    Text(String),
    Bytes(Vec<u8>),
    Absent,
}

impl PropertyValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Label(s) => Some(s),
            PropertyValue::Hex(s) | PropertyValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Integer(v) => serializer.serialize_i64(*v),
            PropertyValue::Boolean(v) => serializer.serialize_bool(*v),
            PropertyValue::Label(s) => serializer.serialize_str(s),
            PropertyValue::Hex(s) | PropertyValue::Text(s) => serializer.serialize_str(s),
            PropertyValue::Bytes(b) => {
                let mut hex = String::with_capacity(b.len() * 2);
                for byte in b {
                    hex.push_str(&format!("{:02x}", byte));
                }
                serializer.serialize_str(&hex)
            }
            PropertyValue::Absent => serializer.serialize_none(),
        }
    }
}

/// Decoded properties of one control, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlPropertyBlock {
    entries: Vec<(&'static str, PropertyValue)>,
}

impl ControlPropertyBlock {
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PropertyValue)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &'static str, value: PropertyValue) {
        trace!("{} = {:?}", name, value);
        self.entries.push((name, value));
    }
}

impl Serialize for ControlPropertyBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

const RICH_TEXT_MARKER: &[u8] = b"\\fs16 ";
const RICH_TEXT_TERMINATOR: &[u8] = b"\\par";

/// The text between the first `\fs16 ` and the `\par` after it.
///
/// `None` when the marker is missing; a missing terminator runs to the end.
pub fn rich_text_fragment(rtf: &[u8]) -> Option<&[u8]> {
    let start = memmem::find(rtf, RICH_TEXT_MARKER)? + RICH_TEXT_MARKER.len();
    let rest = &rtf[start..];
    let end = memmem::find(rest, RICH_TEXT_TERMINATOR).unwrap_or(rest.len());
    Some(&rest[..end])
}

const FONT_NAME_LENGTH_OFFSET: usize = 9;
const FONT_NAME_OFFSET: usize = 11;

/// The face name stored in a font description blob.
///
/// The length is a big-endian `i16` at offset 9 and the name starts at offset 11. `None` when
/// the blob is too short for either.
pub fn font_face_name(font: &[u8]) -> Option<&[u8]> {
    let len_bytes = font.get(FONT_NAME_LENGTH_OFFSET..FONT_NAME_OFFSET)?;
    let len = i16::from_be_bytes([len_bytes[0], len_bytes[1]]);
    let len = usize::try_from(len).ok()?;
    font.get(FONT_NAME_OFFSET..FONT_NAME_OFFSET.checked_add(len)?)
}

fn read_scalar<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    wire: WireType,
    what: &'static str,
) -> DeserializationResult<i64> {
    match wire {
        WireType::I16 => Ok(i64::from(stream.read_i16(what)?)),
        WireType::I32 => Ok(i64::from(stream.read_i32(what)?)),
        WireType::U32 => Ok(i64::from(stream.read_u32(what)?)),
        WireType::Raw(_) => Err(DeserializationError::schema(
            what,
            stream.pos(),
            "raw field has no numeric value",
        )),
    }
}

fn byte_count(value: i64, what: &'static str, offset: usize) -> DeserializationResult<usize> {
    usize::try_from(value).map_err(|_| {
        DeserializationError::schema(what, offset, format!("negative byte count {}", value))
    })
}

/// Decodes `schema` field by field from `stream`.
pub fn decode_property_block<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    schema: &[FieldSpec],
    ansi_codec: EncodingRef,
) -> DeserializationResult<ControlPropertyBlock> {
    let mut block = ControlPropertyBlock::default();

    for field in schema {
        let offset = stream.pos();

        if let WireType::Raw(len) = field.wire {
            let bytes = stream.read_bytes(len, field.name)?;
            match field.kind {
                SemanticKind::Reserved => trace!("{}: discarding {} bytes", field.name, len),
                _ => {
                    let bytes = bytes.to_vec();
                    block.push(field.name, PropertyValue::Bytes(bytes))
                }
            }
            continue;
        }

        let value = read_scalar(stream, field.wire, field.name)?;
        match field.kind {
            SemanticKind::Scalar => block.push(field.name, PropertyValue::Integer(value)),
            SemanticKind::Boolean => block.push(field.name, PropertyValue::Boolean(value > 0)),
            SemanticKind::Enum(labels) => {
                let label = usize::try_from(value)
                    .ok()
                    .and_then(|i| labels.get(i))
                    .ok_or_else(|| {
                        DeserializationError::schema(
                            field.name,
                            offset,
                            format!("index {} is outside its {} labels", value, labels.len()),
                        )
                    })?;
                block.push(field.name, PropertyValue::Label(label));
            }
            SemanticKind::Hex => {
                block.push(field.name, PropertyValue::Hex(format!("{:#x}", value)));
            }
            SemanticKind::Text => {
                let len = byte_count(value, field.name, offset)?;
                let bytes = stream.read_bytes(len, field.name)?;
                let text = decode_ansi_stripped(bytes, ansi_codec, field.name)?;
                block.push(field.name, PropertyValue::Text(text));
            }
            SemanticKind::Blob => {
                let len = byte_count(value, field.name, offset)?;
                if len > 0 {
                    let bytes = stream.read_bytes(len, field.name)?.to_vec();
                    block.push(field.name, PropertyValue::Bytes(bytes));
                } else {
                    block.push(field.name, PropertyValue::Absent);
                }
            }
            SemanticKind::Font { name_key } => {
                let len = byte_count(value, field.name, offset)?;
                let font = stream.read_bytes(len, field.name)?.to_vec();
                let face = match font_face_name(&font) {
                    Some(face) => Some(decode_ansi(face, ansi_codec, name_key)?),
                    None => {
                        debug!(
                            "{} at {}: {} bytes is too short for a face name",
                            field.name,
                            offset,
                            font.len()
                        );
                        None
                    }
                };
                block.push(field.name, PropertyValue::Bytes(font));
                if let Some(face) = face {
                    block.push(name_key, PropertyValue::Text(face));
                }
            }
            SemanticKind::RichText { text_key } => {
                let len = byte_count(value, field.name, offset)?;
                let rtf = strip_nuls(stream.read_bytes(len, field.name)?);
                let text = match rich_text_fragment(&rtf) {
                    Some(fragment) => Some(decode_ansi(fragment, ansi_codec, text_key)?),
                    None => {
                        debug!("{} at {}: no text run found", field.name, offset);
                        None
                    }
                };
                block.push(
                    field.name,
                    PropertyValue::Text(decode_ansi(&rtf, ansi_codec, field.name)?),
                );
                if let Some(text) = text {
                    block.push(text_key, PropertyValue::Text(text));
                }
            }
            SemanticKind::Reserved => trace!("{}: discarding {}", field.name, value),
        }
    }

    Ok(block)
}
