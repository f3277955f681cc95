use log::debug;

use crate::err::DeserializationResult;
use crate::forms::extract::{CustomControl, CustomControlDecoder};
use crate::forms::property_block::SemanticKind::*;
use crate::forms::property_block::WireType::*;
use crate::forms::property_block::{FieldSpec, decode_property_block};
use crate::forms::stream::FormStreamReader;
use crate::guid::Guid;
use crate::settings::ExtractionSettings;

/// `{E5CA59F5-57C4-4DD8-9BD6-1DEEEDD27AF4}`
pub const INKEDIT_CLSID: Guid = Guid::from_fields(
    0xE5CA59F5,
    0x57C4,
    0x4DD8,
    [0x9B, 0xD6, 0x1D, 0xEE, 0xED, 0xD2, 0x7A, 0xF4],
);

pub const INKEDIT_KIND: &str = "InkEdit";

const APPEARANCE: &[&str] = &["0 - rtfFlat", "1 - rtfThreeD"];
const BORDER_STYLE: &[&str] = &["0 - rtfNoBorder", "1 - rtfFixedSingle"];
const MOUSE_POINTER: &[&str] = &[
    "0 - IMP_Default",
    "1 - IMP_Arrow",
    "2 - IMP_Crosshair",
    "3 - IMP_Ibeam",
    "4 - IMP_SizeNESW",
    "5 - IMP_SizeNS",
    "6 - IMP_SizeNWSE",
    "7 - IMP_SizeWE",
    "8 - IMP_UpArrow",
    "9 - IMP_Hourglass",
    "10 - IMP_NoDrop",
    "11 - IMP_ArrowHourglass",
    "12 - IMP_ArrowQuestion",
    "13 - IMP_SizeAll",
    "14 - IMP_Hand",
    "99 - IMP_Custom",
];
const INK_MODE: &[&str] = &["0 - IEM_Disabled", "1 - IEM_Ink", "2 - IEM_InkAndGesture"];
const INK_INSERT_MODE: &[&str] = &["0 - IEM_InsertText", "1 - IEM_InsertInk"];
const SCROLL_BARS: &[&str] = &[
    "0 - rtfNone",
    "1 - rtfHorizontal",
    "2 - rtfVertical",
    "3 - rtfBoth",
];

/// Persisted property layout of the InkEdit control, in wire order.
///
/// The `apperance` spelling is what existing reports key on and is kept.
pub const INKEDIT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("version", I16, Scalar),
    FieldSpec::new("cbClassTable", I16, Scalar),
    FieldSpec::new("PropMask", I32, Scalar),
    FieldSpec::new("data_size", I32, Scalar),
    FieldSpec::new("unknown_1", I32, Reserved),
    FieldSpec::new("unknown_2", I32, Reserved),
    FieldSpec::new("width", I32, Scalar),
    FieldSpec::new("height", I32, Scalar),
    FieldSpec::new("backColor", U32, Hex),
    FieldSpec::new("apperance", I32, Enum(APPEARANCE)),
    FieldSpec::new("borderStyle", I32, Enum(BORDER_STYLE)),
    FieldSpec::new("MousePointer", I32, Enum(MOUSE_POINTER)),
    FieldSpec::new("InkMode", I32, Enum(INK_MODE)),
    FieldSpec::new("InkInsertMode", I32, Enum(INK_INSERT_MODE)),
    FieldSpec::new("RecognTimeOut", I32, Scalar),
    FieldSpec::new("Locked", I16, Boolean),
    FieldSpec::new("MultiLine", I16, Boolean),
    FieldSpec::new("disableNoScroll", I16, Boolean),
    FieldSpec::new("padding_1", I16, Reserved),
    FieldSpec::new("ScrollBars", I32, Enum(SCROLL_BARS)),
    FieldSpec::new("Enabled", I16, Scalar),
    FieldSpec::new("padding_2", I16, Reserved),
    FieldSpec::new("MaxLength", I32, Scalar),
    FieldSpec::new("UseMouseForInput", I16, Scalar),
    FieldSpec::new("padding_3", Raw(6), Reserved),
    FieldSpec::new("factorid", I32, Text),
    FieldSpec::new("mouseIcon", I32, Blob),
    FieldSpec::new(
        "font_data",
        I32,
        Font {
            name_key: "fontname",
        },
    ),
    FieldSpec::new("rtf_data", I32, RichText { text_key: "text" }),
];

/// Decoder for the Microsoft InkEdit control.
#[derive(Debug, Default, Clone, Copy)]
pub struct InkEditDecoder;

impl CustomControlDecoder for InkEditDecoder {
    fn kind(&self) -> &'static str {
        INKEDIT_KIND
    }

    fn class_id(&self) -> Guid {
        INKEDIT_CLSID
    }

    fn decode(
        &self,
        stream: &mut dyn FormStreamReader,
        settings: &ExtractionSettings,
    ) -> DeserializationResult<CustomControl> {
        let start = stream.pos();
        let properties = decode_property_block(stream, INKEDIT_SCHEMA, settings.get_ansi_codec())?;
        debug!(
            "decoded InkEdit control at {} ({} properties)",
            start,
            properties.len()
        );

        let rich_text = properties
            .get("rtf_data")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let text = properties
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        Ok(CustomControl {
            kind: INKEDIT_KIND,
            rich_text,
            text,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_29_entries() {
        assert_eq!(INKEDIT_SCHEMA.len(), 29);
        assert_eq!(INKEDIT_SCHEMA[0].name, "version");
        assert_eq!(INKEDIT_SCHEMA[28].name, "rtf_data");
    }

    #[test]
    fn test_clsid_wire_bytes() {
        assert_eq!(
            INKEDIT_CLSID.as_bytes(),
            &[
                0xF5, 0x59, 0xCA, 0xE5, 0xC4, 0x57, 0xD8, 0x4D, 0x9B, 0xD6, 0x1D, 0xEE, 0xED,
                0xD2, 0x7A, 0xF4
            ]
        );
    }
}
