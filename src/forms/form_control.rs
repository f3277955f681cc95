use bitflags::bitflags;
use encoding::EncodingRef;
use log::{debug, trace};

use crate::err::{DeserializationError, DeserializationResult};
use crate::forms::class_table::SiteClassInfoParser;
use crate::forms::site::{SiteDescriptor, read_site};
use crate::forms::stream::{
    AlignedBlock, CountOfBytesWithCompressionFlag, FormStreamReader, read_padded_string,
    will_jump_to,
};
use crate::guid::Guid;
use crate::utils::decode_ansi;

/// `{0BE35204-8F91-11CE-9DE3-00AA004BB851}`
pub const STD_PICTURE_CLSID: Guid = Guid::from_fields(
    0x0BE35204,
    0x8F91,
    0x11CE,
    [0x9D, 0xE3, 0x00, 0xAA, 0x00, 0x4B, 0xB8, 0x51],
);
/// `{0BE35203-8F91-11CE-9DE3-00AA004BB851}`
pub const STD_FONT_CLSID: Guid = Guid::from_fields(
    0x0BE35203,
    0x8F91,
    0x11CE,
    [0x9D, 0xE3, 0x00, 0xAA, 0x00, 0x4B, 0xB8, 0x51],
);
/// `{AFC20920-DA4E-11CE-B943-00AA006887B4}`
pub const TEXT_PROPS_CLSID: Guid = Guid::from_fields(
    0xAFC20920,
    0xDA4E,
    0x11CE,
    [0xB9, 0x43, 0x00, 0xAA, 0x00, 0x68, 0x87, 0xB4],
);

const PICTURE_PREAMBLE: u32 = 0x0000_746C;

bitflags! {
    /// `FormPropMask`: which optional fields a `FormControl` carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormPropMask: u32 {
        const UNUSED1            = 1 << 0;
        const BACK_COLOR         = 1 << 1;
        const FORE_COLOR         = 1 << 2;
        const NEXT_AVAILABLE_ID  = 1 << 3;
        const UNUSED2            = 0b11 << 4;
        const BOOLEAN_PROPERTIES = 1 << 6;
        const BORDER_STYLE       = 1 << 7;
        const MOUSE_POINTER      = 1 << 8;
        const SCROLL_BARS        = 1 << 9;
        const DISPLAYED_SIZE     = 1 << 10;
        const LOGICAL_SIZE       = 1 << 11;
        const SCROLL_POSITION    = 1 << 12;
        const GROUP_CNT          = 1 << 13;
        const RESERVED           = 1 << 14;
        const MOUSE_ICON         = 1 << 15;
        const CYCLE              = 1 << 16;
        const SPECIAL_EFFECT     = 1 << 17;
        const BORDER_COLOR       = 1 << 18;
        const CAPTION            = 1 << 19;
        const FONT               = 1 << 20;
        const PICTURE            = 1 << 21;
        const ZOOM               = 1 << 22;
        const PICTURE_ALIGNMENT  = 1 << 23;
        const PICTURE_TILING     = 1 << 24;
        const PICTURE_SIZE_MODE  = 1 << 25;
        const SHAPE_COOKIE       = 1 << 26;
        const DRAW_BUFFER        = 1 << 27;
    }
}

bitflags! {
    /// `FormFlags` stored in a form's `BooleanProperties`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormFlags: u32 {
        const ENABLED            = 1 << 2;
        const DESINK_PERSISTED   = 1 << 14;
        const DONT_SAVE_CLASS_TABLE = 1 << 15;
    }
}

/// The parts of a form definition (`f` stream) that matter for locating its controls.
#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    pub prop_mask: FormPropMask,
    pub flags: FormFlags,
    pub next_available_id: Option<u32>,
    pub displayed_size: Option<(u32, u32)>,
    pub logical_size: Option<(u32, u32)>,
    pub caption: Option<String>,
    pub font_face: Option<String>,
    pub sites: Vec<SiteDescriptor>,
}

fn read_guid<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    what: &'static str,
) -> DeserializationResult<Guid> {
    let bytes = stream.read_bytes(16, what)?;
    let mut raw = [0u8; 16];
    raw.copy_from_slice(bytes);
    Ok(Guid::from_bytes(raw))
}

fn expect_guid<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    expected: Guid,
    what: &'static str,
) -> DeserializationResult<()> {
    let offset = stream.pos();
    let guid = read_guid(stream, what)?;
    if guid != expected {
        return Err(DeserializationError::mismatch(
            what,
            offset,
            "a known class id",
            guid.data1(),
        ));
    }
    Ok(())
}

fn skip_guid_and_picture<R: FormStreamReader + ?Sized>(
    stream: &mut R,
) -> DeserializationResult<()> {
    expect_guid(stream, STD_PICTURE_CLSID, "GuidAndPicture guid")?;
    let offset = stream.pos();
    let preamble = stream.read_u32("StdPicture preamble")?;
    if preamble != PICTURE_PREAMBLE {
        return Err(DeserializationError::mismatch(
            "StdPicture preamble",
            offset,
            "0x0000746C",
            preamble,
        ));
    }
    let size = stream.read_u32("StdPicture size")?;
    stream.read_bytes(size as usize, "StdPicture data")?;
    Ok(())
}

/// Reads a `GuidAndFont` and returns the face name when it is a `StdFont`.
fn read_guid_and_font<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    ansi_codec: EncodingRef,
) -> DeserializationResult<Option<String>> {
    let offset = stream.pos();
    let guid = read_guid(stream, "GuidAndFont guid")?;

    if guid == STD_FONT_CLSID {
        let version_offset = stream.pos();
        let version = stream.read_u8("StdFont version")?;
        if version != 1 {
            return Err(DeserializationError::mismatch(
                "StdFont version",
                version_offset,
                "1",
                version,
            ));
        }
        // sCharset, bFlags, sWeight, ulHeight
        stream.read_bytes(9, "StdFont attributes")?;
        let face_len = stream.read_u8("StdFont bFaceLen")?;
        let face = stream.read_bytes(usize::from(face_len), "StdFont sFontFace")?;
        Ok(Some(decode_ansi(face, ansi_codec, "StdFont sFontFace")?))
    } else if guid == TEXT_PROPS_CLSID {
        let version_offset = stream.pos();
        let minor = stream.read_u8("TextProps MinorVersion")?;
        let major = stream.read_u8("TextProps MajorVersion")?;
        if (minor, major) != (0, 2) {
            return Err(DeserializationError::mismatch(
                "TextProps version",
                version_offset,
                "0.2",
                u16::from_le_bytes([minor, major]),
            ));
        }
        let cb_text_props = stream.read_u16("TextProps cbTextProps")?;
        stream.read_bytes(usize::from(cb_text_props), "TextProps data")?;
        Ok(None)
    } else {
        Err(DeserializationError::mismatch(
            "GuidAndFont guid",
            offset,
            "StdFont or TextProps",
            guid.data1(),
        ))
    }
}

/// Site depths and types are only counted; the nesting they describe is not used.
fn skip_site_depths_and_types<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    count_of_sites: u32,
) -> DeserializationResult<()> {
    let block = AlignedBlock::begin(stream);
    let mut remaining = count_of_sites;
    while remaining > 0 {
        let offset = stream.pos();
        let _depth = block.u8(stream, "SiteDepth")?;
        let type_or_count = block.u8(stream, "TypeOrCount")?;
        let count = if type_or_count & 0x80 != 0 {
            block.u8(stream, "SiteType")?;
            u32::from(type_or_count & 0x7F)
        } else {
            1
        };
        if count == 0 {
            return Err(DeserializationError::mismatch(
                "TypeOrCount",
                offset,
                "a non-zero site count",
                type_or_count,
            ));
        }
        remaining = remaining.saturating_sub(count);
    }
    block.finish(stream, "SiteDepthsAndTypes padding")
}

fn read_pair(
    block: &AlignedBlock,
    stream: &mut dyn FormStreamReader,
    present: bool,
    what: &'static str,
) -> DeserializationResult<Option<(u32, u32)>> {
    if present {
        Ok(Some((block.u32(stream, what)?, block.u32(stream, what)?)))
    } else {
        Ok(None)
    }
}

/// Everything inside `cbForm`: the property mask and the data and extra data blocks.
struct FormHeader {
    mask: FormPropMask,
    flags: FormFlags,
    next_available_id: Option<u32>,
    displayed_size: Option<(u32, u32)>,
    logical_size: Option<(u32, u32)>,
    caption: Option<String>,
}

fn read_form_header(
    s: &mut dyn FormStreamReader,
    ansi_codec: EncodingRef,
) -> DeserializationResult<FormHeader> {
    let mask = FormPropMask::from_bits_retain(s.read_u32("FormPropMask")?);
    trace!("FormPropMask {:?}", mask);

    let block = AlignedBlock::begin(s);
    let mut next_available_id = None;
    let mut flags = FormFlags::ENABLED;
    let mut caption_len = CountOfBytesWithCompressionFlag::default();
    if mask.contains(FormPropMask::BACK_COLOR) {
        block.u32(s, "BackColor")?;
    }
    if mask.contains(FormPropMask::FORE_COLOR) {
        block.u32(s, "ForeColor")?;
    }
    if mask.contains(FormPropMask::NEXT_AVAILABLE_ID) {
        next_available_id = Some(block.u32(s, "NextAvailableID")?);
    }
    if mask.contains(FormPropMask::BOOLEAN_PROPERTIES) {
        flags = FormFlags::from_bits_retain(block.u32(s, "BooleanProperties")?);
    }
    for (flag, what) in [
        (FormPropMask::BORDER_STYLE, "BorderStyle"),
        (FormPropMask::MOUSE_POINTER, "MousePointer"),
        (FormPropMask::SCROLL_BARS, "ScrollBars"),
    ] {
        if mask.contains(flag) {
            block.u8(s, what)?;
        }
    }
    if mask.contains(FormPropMask::GROUP_CNT) {
        block.u32(s, "GroupCnt")?;
    }
    if mask.contains(FormPropMask::MOUSE_ICON) {
        block.u16(s, "MouseIcon")?;
    }
    if mask.contains(FormPropMask::CYCLE) {
        block.u8(s, "Cycle")?;
    }
    if mask.contains(FormPropMask::SPECIAL_EFFECT) {
        block.u8(s, "SpecialEffect")?;
    }
    if mask.contains(FormPropMask::BORDER_COLOR) {
        block.u32(s, "BorderColor")?;
    }
    if mask.contains(FormPropMask::CAPTION) {
        caption_len = CountOfBytesWithCompressionFlag::from(block.u32(s, "Caption")?);
    }
    if mask.contains(FormPropMask::FONT) {
        block.u16(s, "Font")?;
    }
    if mask.contains(FormPropMask::PICTURE) {
        block.u16(s, "Picture")?;
    }
    if mask.contains(FormPropMask::ZOOM) {
        block.u32(s, "Zoom")?;
    }
    if mask.contains(FormPropMask::PICTURE_ALIGNMENT) {
        block.u8(s, "PictureAlignment")?;
    }
    if mask.contains(FormPropMask::PICTURE_SIZE_MODE) {
        block.u8(s, "PictureSizeMode")?;
    }
    if mask.contains(FormPropMask::SHAPE_COOKIE) {
        block.u32(s, "ShapeCookie")?;
    }
    if mask.contains(FormPropMask::DRAW_BUFFER) {
        block.u32(s, "DrawBuffer")?;
    }
    block.finish(s, "FormDataBlock padding")?;

    let extra = AlignedBlock::begin(s);
    let displayed_size = read_pair(
        &extra,
        s,
        mask.contains(FormPropMask::DISPLAYED_SIZE),
        "DisplayedSize",
    )?;
    let logical_size = read_pair(
        &extra,
        s,
        mask.contains(FormPropMask::LOGICAL_SIZE),
        "LogicalSize",
    )?;
    read_pair(
        &extra,
        s,
        mask.contains(FormPropMask::SCROLL_POSITION),
        "ScrollPosition",
    )?;
    let caption = if mask.contains(FormPropMask::CAPTION) {
        Some(read_padded_string(s, caption_len, ansi_codec, "Caption")?)
    } else {
        None
    };
    extra.finish(s, "FormExtraDataBlock padding")?;

    Ok(FormHeader {
        mask,
        flags,
        next_available_id,
        displayed_size,
        logical_size,
        caption,
    })
}

/// Reads a `FormControl` structure, feeding its class table to `class_table`.
pub(crate) fn read_form_control(
    stream: &mut dyn FormStreamReader,
    class_table: &mut dyn SiteClassInfoParser,
    ansi_codec: EncodingRef,
) -> DeserializationResult<FormControl> {
    let offset = stream.pos();
    let minor = stream.read_u8("FormControl MinorVersion")?;
    let major = stream.read_u8("FormControl MajorVersion")?;
    if (minor, major) != (0, 4) {
        return Err(DeserializationError::mismatch(
            "FormControl version",
            offset,
            "0.4",
            u16::from_le_bytes([minor, major]),
        ));
    }
    let cb_form = stream.read_u16("FormControl cbForm")?;
    let header = will_jump_to(stream, usize::from(cb_form), "FormControl", |s| {
        read_form_header(s, ansi_codec)
    })?;

    let mut font_face = None;
    if header.mask.contains(FormPropMask::MOUSE_ICON) {
        skip_guid_and_picture(stream)?;
    }
    if header.mask.contains(FormPropMask::FONT) {
        font_face = read_guid_and_font(stream, ansi_codec)?;
    }
    if header.mask.contains(FormPropMask::PICTURE) {
        skip_guid_and_picture(stream)?;
    }

    if !header.flags.contains(FormFlags::DONT_SAVE_CLASS_TABLE) {
        let count = stream.read_u16("CountOfSiteClassInfo")?;
        debug!("form declares {} class table entries", count);
        for _ in 0..count {
            class_table.parse_site_class_info(stream)?;
        }
    }

    let count_of_sites = stream.read_u32("CountOfSites")?;
    let count_of_bytes = stream.read_u32("CountOfBytes")?;
    debug!(
        "form declares {} sites in {} bytes",
        count_of_sites, count_of_bytes
    );

    let sites = will_jump_to(stream, count_of_bytes as usize, "FormSiteData", |s| {
        skip_site_depths_and_types(s, count_of_sites)?;
        let mut sites = Vec::new();
        for _ in 0..count_of_sites {
            sites.push(read_site(s, ansi_codec)?);
        }
        Ok(sites)
    })?;

    Ok(FormControl {
        prop_mask: header.mask,
        flags: header.flags,
        next_available_id: header.next_available_id,
        displayed_size: header.displayed_size,
        logical_size: header.logical_size,
        caption: header.caption,
        font_face,
        sites,
    })
}
