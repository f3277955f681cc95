use encoding::EncodingRef;
use log::trace;
use serde::Serialize;

use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::{ByteCursor, decode_ansi};

/// The only valid value of `cbHeader`.
pub const PICTURE_HEADER_SIZE: u16 = 0x44;

pub const MM_SHAPE: u16 = 0x64;
pub const MM_SHAPEFILE: u16 = 0x66;

/// Metafile presentation fields (`mfpf`).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct MetafilePresentation {
    pub mapping_mode: u16,
    pub x_ext: u16,
    pub y_ext: u16,
    pub hmf: u16,
}

/// Header of one picture element in the graphics data stream.
///
/// The element size field (`lcb`) is read by the walker before this header, since it is the
/// authoritative resume point even when the header is rejected.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct PictureHeader {
    pub mfpf: MetafilePresentation,
    pub grf: u32,
    pub mm_pm: u16,
    /// Initial width of the picture in twips.
    pub dxa_goal: i16,
    pub dya_goal: i16,
    pub mx: u16,
    pub my: u16,
    pub bpp: u8,
    pub borders: [[u8; 4]; 4],
    pub name: Option<String>,
}

impl PictureHeader {
    /// Reads and validates the header that follows the element size.
    ///
    /// A `StructuralMismatch` means the element is not a shape picture and should be skipped.
    pub(crate) fn from_cursor(
        cursor: &mut ByteCursor,
        ansi_codec: EncodingRef,
    ) -> DeserializationResult<PictureHeader> {
        let header_offset = cursor.pos();
        let cb_header = cursor.u16_named("picture cbHeader")?;
        if cb_header != PICTURE_HEADER_SIZE {
            return Err(DeserializationError::mismatch(
                "picture cbHeader",
                header_offset,
                "0x44",
                cb_header,
            ));
        }

        let mm_offset = cursor.pos();
        let mfpf = MetafilePresentation {
            mapping_mode: cursor.u16_named("mfpf.mm")?,
            x_ext: cursor.u16_named("mfpf.xExt")?,
            y_ext: cursor.u16_named("mfpf.yExt")?,
            hmf: cursor.u16_named("mfpf.swHMF")?,
        };
        if mfpf.mapping_mode != MM_SHAPE && mfpf.mapping_mode != MM_SHAPEFILE {
            return Err(DeserializationError::mismatch(
                "mfpf.mm",
                mm_offset,
                "MM_SHAPE (0x64) or MM_SHAPEFILE (0x66)",
                mfpf.mapping_mode,
            ));
        }

        // innerHeader
        let grf = cursor.u32_named("innerHeader.grf")?;
        cursor.advance(4, "innerHeader.padding1")?;
        let mm_pm = cursor.u16_named("innerHeader.mmPM")?;
        cursor.advance(4, "innerHeader.padding2")?;

        // picmid
        let dxa_goal = cursor.i16_named("picmid.dxaGoal")?;
        let dya_goal = cursor.i16_named("picmid.dyaGoal")?;
        let mx = cursor.u16_named("picmid.mx")?;
        let my = cursor.u16_named("picmid.my")?;
        cursor.advance(8, "picmid reserved extents")?;
        cursor.advance(1, "picmid.fReserved")?;
        let bpp = cursor.u8_named("picmid.bpp")?;
        let borders = [
            cursor.array::<4>("picmid.brcTop80")?,
            cursor.array::<4>("picmid.brcLeft80")?,
            cursor.array::<4>("picmid.brcBottom80")?,
            cursor.array::<4>("picmid.brcRight80")?,
        ];
        cursor.advance(4, "picmid reserved3")?;

        let props_offset = cursor.pos();
        let c_props = cursor.u16_named("picture cProps")?;
        if c_props != 0 {
            return Err(DeserializationError::mismatch(
                "picture cProps",
                props_offset,
                "0",
                c_props,
            ));
        }

        let name = if mfpf.mapping_mode == MM_SHAPEFILE {
            let len = cursor.u8_named("PicName length")?;
            let bytes = cursor.take_bytes(usize::from(len), "PicName")?;
            Some(decode_ansi(bytes, ansi_codec, "PicName")?)
        } else {
            None
        };

        trace!(
            "picture header at {}: mm={:#x} goal={}x{} bpp={} name={:?}",
            header_offset, mfpf.mapping_mode, dxa_goal, dya_goal, bpp, name
        );

        Ok(PictureHeader {
            mfpf,
            grf,
            mm_pm,
            dxa_goal,
            dya_goal,
            mx,
            my,
            bpp,
            borders,
            name,
        })
    }
}
