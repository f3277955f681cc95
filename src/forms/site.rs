use bitflags::bitflags;
use encoding::EncodingRef;
use log::trace;
use serde::Serialize;

use crate::err::{DeserializationError, DeserializationResult};
use crate::forms::extract::CustomControl;
use crate::forms::stream::{
    AlignedBlock, CountOfBytesWithCompressionFlag, FormStreamReader, read_padded_string,
    will_jump_to,
};

/// Cache index used when a site does not store one.
pub const DEFAULT_CLSID_CACHE_INDEX: u16 = 0x7FFF;

bitflags! {
    /// `SitePropMask`: which optional fields an `OleSiteConcreteControl` carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SitePropMask: u32 {
        const NAME              = 1 << 0;
        const TAG               = 1 << 1;
        const ID                = 1 << 2;
        const HELP_CONTEXT_ID   = 1 << 3;
        const BIT_FLAGS         = 1 << 4;
        const OBJECT_STREAM_SIZE = 1 << 5;
        const TAB_INDEX         = 1 << 6;
        const CLSID_CACHE_INDEX = 1 << 7;
        const POSITION          = 1 << 8;
        const GROUP_ID          = 1 << 9;
        const UNUSED            = 1 << 10;
        const CONTROL_TIP_TEXT  = 1 << 11;
        const RUNTIME_LIC_KEY   = 1 << 12;
        const CONTROL_SOURCE    = 1 << 13;
        const ROW_SOURCE        = 1 << 14;
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum MorphDataKind {
    MorphData,
    TextBox,
    ListBox,
    ComboBox,
    CheckBox,
    OptionButton,
    ToggleButton,
}

/// What a site's class cache index says about the control it hosts.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum ControlKind {
    Form,
    Image,
    Frame,
    MorphData(MorphDataKind),
    SpinButton,
    CommandButton,
    TabStrip,
    Label,
    ScrollBar,
    MultiPage,
    /// Positional reference into the form's class table.
    Custom(u16),
    Unsupported(u16),
}

impl ControlKind {
    pub fn from_cache_index(index: u16) -> ControlKind {
        match index {
            7 => ControlKind::Form,
            12 => ControlKind::Image,
            14 => ControlKind::Frame,
            15 => ControlKind::MorphData(MorphDataKind::MorphData),
            16 => ControlKind::SpinButton,
            17 => ControlKind::CommandButton,
            18 => ControlKind::TabStrip,
            21 => ControlKind::Label,
            23 => ControlKind::MorphData(MorphDataKind::TextBox),
            24 => ControlKind::MorphData(MorphDataKind::ListBox),
            25 => ControlKind::MorphData(MorphDataKind::ComboBox),
            26 => ControlKind::MorphData(MorphDataKind::CheckBox),
            27 => ControlKind::MorphData(MorphDataKind::OptionButton),
            28 => ControlKind::MorphData(MorphDataKind::ToggleButton),
            47 => ControlKind::ScrollBar,
            57 => ControlKind::MultiPage,
            i if i > DEFAULT_CLSID_CACHE_INDEX => ControlKind::Custom(i),
            i => ControlKind::Unsupported(i),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, ControlKind::Custom(_) | ControlKind::Unsupported(_))
    }
}

/// One control site declared by a form.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct SiteDescriptor {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub control_tip_text: Option<String>,
    pub tab_index: i16,
    pub clsid_cache_index: u16,
    /// Bytes this control occupies in the form data stream.
    pub object_stream_size: Option<u32>,
    pub group_id: Option<u16>,
    /// Top-left corner in HIMETRIC, relative to the parent.
    pub position: Option<(i32, i32)>,
    pub kind: ControlKind,
    /// Filled in when a registered decoder understood the control's data.
    pub custom: Option<CustomControl>,
}

fn optional_count<R: FormStreamReader + ?Sized>(
    block: &AlignedBlock,
    stream: &mut R,
    present: bool,
    what: &'static str,
) -> DeserializationResult<CountOfBytesWithCompressionFlag> {
    if present {
        Ok(CountOfBytesWithCompressionFlag::from(block.u32(stream, what)?))
    } else {
        Ok(CountOfBytesWithCompressionFlag::default())
    }
}

fn optional_string<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    present: bool,
    count: CountOfBytesWithCompressionFlag,
    ansi_codec: EncodingRef,
    what: &'static str,
) -> DeserializationResult<Option<String>> {
    if present {
        Ok(Some(read_padded_string(stream, count, ansi_codec, what)?))
    } else {
        Ok(None)
    }
}

fn read_site_body<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    ansi_codec: EncodingRef,
) -> DeserializationResult<SiteDescriptor> {
    let mask = SitePropMask::from_bits_retain(stream.read_u32("SitePropMask")?);
    trace!("SitePropMask {:?}", mask);

    let block = AlignedBlock::begin(stream);
    let name_len = optional_count(&block, stream, mask.contains(SitePropMask::NAME), "NameData")?;
    let tag_len = optional_count(&block, stream, mask.contains(SitePropMask::TAG), "TagData")?;
    let id = if mask.contains(SitePropMask::ID) {
        Some(block.u32(stream, "ID")?)
    } else {
        None
    };
    if mask.contains(SitePropMask::HELP_CONTEXT_ID) {
        block.u32(stream, "HelpContextID")?;
    }
    if mask.contains(SitePropMask::BIT_FLAGS) {
        block.u32(stream, "BitFlags")?;
    }
    let object_stream_size = if mask.contains(SitePropMask::OBJECT_STREAM_SIZE) {
        Some(block.u32(stream, "ObjectStreamSize")?)
    } else {
        None
    };
    let tab_index = if mask.contains(SitePropMask::TAB_INDEX) {
        block.i16(stream, "TabIndex")?
    } else {
        -1
    };
    let clsid_cache_index = if mask.contains(SitePropMask::CLSID_CACHE_INDEX) {
        block.u16(stream, "ClsidCacheIndex")?
    } else {
        DEFAULT_CLSID_CACHE_INDEX
    };
    let group_id = if mask.contains(SitePropMask::GROUP_ID) {
        Some(block.u16(stream, "GroupID")?)
    } else {
        None
    };
    let tip_len = optional_count(
        &block,
        stream,
        mask.contains(SitePropMask::CONTROL_TIP_TEXT),
        "ControlTipText",
    )?;
    for (flag, what) in [
        (SitePropMask::RUNTIME_LIC_KEY, "RuntimeLicKey"),
        (SitePropMask::CONTROL_SOURCE, "ControlSource"),
        (SitePropMask::ROW_SOURCE, "RowSource"),
    ] {
        if mask.contains(flag) {
            block.u32(stream, what)?;
        }
    }
    block.finish(stream, "SiteDataBlock padding")?;

    let name = optional_string(stream, mask.contains(SitePropMask::NAME), name_len, ansi_codec, "Name")?;
    let tag = optional_string(stream, mask.contains(SitePropMask::TAG), tag_len, ansi_codec, "Tag")?;
    let position = if mask.contains(SitePropMask::POSITION) {
        Some((
            stream.read_i32("SitePosition.Top")?,
            stream.read_i32("SitePosition.Left")?,
        ))
    } else {
        None
    };
    let control_tip_text = optional_string(
        stream,
        mask.contains(SitePropMask::CONTROL_TIP_TEXT),
        tip_len,
        ansi_codec,
        "ControlTipText",
    )?;

    Ok(SiteDescriptor {
        id,
        name,
        tag,
        control_tip_text,
        tab_index,
        clsid_cache_index,
        object_stream_size,
        group_id,
        position,
        kind: ControlKind::from_cache_index(clsid_cache_index),
        custom: None,
    })
}

/// Reads one `OleSiteConcreteControl` and leaves the stream after its declared size.
pub(crate) fn read_site<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    ansi_codec: EncodingRef,
) -> DeserializationResult<SiteDescriptor> {
    let offset = stream.pos();
    let version = stream.read_u16("OleSiteConcreteControl version")?;
    if version != 0 {
        return Err(DeserializationError::mismatch(
            "OleSiteConcreteControl version",
            offset,
            "0",
            version,
        ));
    }
    let cb_site = stream.read_u16("OleSiteConcreteControl cbSite")?;

    will_jump_to(stream, usize::from(cb_site), "OleSiteConcreteControl", |s| {
        read_site_body(s, ansi_codec)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ByteCursor;
    use encoding::all::WINDOWS_1252;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_index_classification() {
        assert_eq!(ControlKind::from_cache_index(7), ControlKind::Form);
        assert_eq!(
            ControlKind::from_cache_index(26),
            ControlKind::MorphData(MorphDataKind::CheckBox)
        );
        assert_eq!(ControlKind::from_cache_index(0x8003), ControlKind::Custom(0x8003));
        assert_eq!(ControlKind::from_cache_index(0x7FFF), ControlKind::Unsupported(0x7FFF));
        assert_eq!(ControlKind::from_cache_index(30), ControlKind::Unsupported(30));
        assert!(ControlKind::from_cache_index(57).is_builtin());
    }

    #[test]
    fn test_reads_site_with_compressed_name() {
        let mask = SitePropMask::NAME
            | SitePropMask::ID
            | SitePropMask::OBJECT_STREAM_SIZE
            | SitePropMask::TAB_INDEX
            | SitePropMask::CLSID_CACHE_INDEX
            | SitePropMask::POSITION;
        let mut body = mask.bits().to_le_bytes().to_vec();
        body.extend_from_slice(&0x8000_0008u32.to_le_bytes());
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&120u32.to_le_bytes());
        body.extend_from_slice(&2i16.to_le_bytes());
        body.extend_from_slice(&0x8000u16.to_le_bytes());
        body.extend_from_slice(b"InkEdit1");
        body.extend_from_slice(&100i32.to_le_bytes());
        body.extend_from_slice(&50i32.to_le_bytes());

        let mut data = 0u16.to_le_bytes().to_vec();
        data.extend_from_slice(&(body.len() as u16).to_le_bytes());
        data.extend(body);

        let site = read_site(&mut ByteCursor::new(&data), WINDOWS_1252).unwrap();
        assert_eq!(
            site,
            SiteDescriptor {
                id: Some(3),
                name: Some("InkEdit1".to_string()),
                tag: None,
                control_tip_text: None,
                tab_index: 2,
                clsid_cache_index: 0x8000,
                object_stream_size: Some(120),
                group_id: None,
                position: Some((100, 50)),
                kind: ControlKind::Custom(0x8000),
                custom: None,
            }
        );
    }

    #[test]
    fn test_defaults_for_absent_fields() {
        let data = [0u8, 0, 4, 0, 0, 0, 0, 0];
        let site = read_site(&mut ByteCursor::new(&data), WINDOWS_1252).unwrap();
        assert_eq!(site.tab_index, -1);
        assert_eq!(site.clsid_cache_index, DEFAULT_CLSID_CACHE_INDEX);
        assert_eq!(site.kind, ControlKind::Unsupported(0x7FFF));
    }
}
