use bitflags::bitflags;
use log::{debug, trace};

use crate::err::{DeserializationError, DeserializationResult};
use crate::forms::stream::{AlignedBlock, FormStreamReader, will_jump_to};
use crate::guid::Guid;

/// Cache indices at or above this value refer to the class table by position.
pub const CUSTOM_CACHE_INDEX_BASE: u16 = 0x8000;

bitflags! {
    /// `ClassInfoPropMask`: which optional fields a `SiteClassInfo` carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassInfoPropMask: u32 {
        const CLS_ID          = 1 << 0;
        const DISP_EVENT      = 1 << 1;
        const UNUSED1         = 1 << 2;
        const DEFAULT_PROG    = 1 << 3;
        const CLASS_FLAGS     = 1 << 4;
        const COUNT_OF_METHODS = 1 << 5;
        const DISPID_BIND     = 1 << 6;
        const GET_BIND_INDEX  = 1 << 7;
        const PUT_BIND_INDEX  = 1 << 8;
        const BIND_TYPE       = 1 << 9;
        const GET_VALUE_INDEX = 1 << 10;
        const PUT_VALUE_INDEX = 1 << 11;
        const VALUE_TYPE      = 1 << 12;
        const DISPID_ROWSET   = 1 << 13;
        const SET_ROWSET      = 1 << 14;
    }
}

/// Consumer of the `SiteClassInfo` entries at the start of a form's site data.
pub trait SiteClassInfoParser {
    /// Reads one `SiteClassInfo`, leaving the stream at the start of the next structure.
    fn parse_site_class_info(
        &mut self,
        stream: &mut dyn FormStreamReader,
    ) -> DeserializationResult<()>;
}

/// The class table of one form, in stream order.
///
/// Custom controls name their class by position in this table, so entries are only ever
/// appended.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassTableResolver {
    table: Vec<Guid>,
}

impl ClassTableResolver {
    pub fn new() -> Self {
        ClassTableResolver::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn entries(&self) -> &[Guid] {
        &self.table
    }

    pub fn clear(&mut self) {
        self.table.clear()
    }

    /// The class id a custom cache index refers to.
    ///
    /// Built-in indices and positions past the end of the table resolve to `None`.
    pub fn resolve(&self, cache_index: u16) -> Option<&Guid> {
        let position = cache_index.checked_sub(CUSTOM_CACHE_INDEX_BASE)?;
        self.table.get(usize::from(position))
    }
}

/// Reads the gated fields of one `SiteClassInfo` and returns its class id, if present.
fn read_class_info<R: FormStreamReader + ?Sized>(
    stream: &mut R,
) -> DeserializationResult<Option<Guid>> {
    let mask = ClassInfoPropMask::from_bits_retain(stream.read_u32("ClassInfoPropMask")?);
    trace!("ClassInfoPropMask {:?}", mask);

    let block = AlignedBlock::begin(stream);
    if mask.contains(ClassInfoPropMask::CLASS_FLAGS) {
        block.u16(stream, "ClassTableFlags")?;
        block.u16(stream, "VarFlags")?;
    }
    if mask.contains(ClassInfoPropMask::COUNT_OF_METHODS) {
        block.u32(stream, "CountOfMethods")?;
    }
    if mask.contains(ClassInfoPropMask::DISPID_BIND) {
        block.u32(stream, "DispidBind")?;
    }
    if mask.contains(ClassInfoPropMask::GET_BIND_INDEX) {
        block.u16(stream, "GetBindIndex")?;
    }
    if mask.contains(ClassInfoPropMask::PUT_BIND_INDEX) {
        block.u16(stream, "PutBindIndex")?;
    }
    if mask.contains(ClassInfoPropMask::BIND_TYPE) {
        block.u16(stream, "BindType")?;
    }
    if mask.contains(ClassInfoPropMask::GET_VALUE_INDEX) {
        block.u16(stream, "GetValueIndex")?;
    }
    if mask.contains(ClassInfoPropMask::PUT_VALUE_INDEX) {
        block.u16(stream, "PutValueIndex")?;
    }
    if mask.contains(ClassInfoPropMask::VALUE_TYPE) {
        block.u16(stream, "ValueType")?;
    }
    if mask.contains(ClassInfoPropMask::DISPID_ROWSET) {
        block.u32(stream, "DispidRowset")?;
    }
    if mask.contains(ClassInfoPropMask::SET_ROWSET) {
        block.u16(stream, "SetRowset")?;
    }
    block.finish(stream, "ClassInfoDataBlock padding")?;

    let clsid = if mask.contains(ClassInfoPropMask::CLS_ID) {
        let bytes = stream.read_bytes(16, "ClsID")?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Some(Guid::from_bytes(raw))
    } else {
        None
    };
    if mask.contains(ClassInfoPropMask::DISP_EVENT) {
        stream.read_bytes(16, "DispEvent")?;
    }
    if mask.contains(ClassInfoPropMask::DEFAULT_PROG) {
        stream.read_bytes(16, "DefaultProg")?;
    }

    Ok(clsid)
}

impl SiteClassInfoParser for ClassTableResolver {
    fn parse_site_class_info(
        &mut self,
        stream: &mut dyn FormStreamReader,
    ) -> DeserializationResult<()> {
        let offset = stream.pos();
        let version = stream.read_u16("SiteClassInfo version")?;
        if version != 0 {
            return Err(DeserializationError::mismatch(
                "SiteClassInfo version",
                offset,
                "0",
                version,
            ));
        }
        let cb_class_table = stream.read_u16("SiteClassInfo cbClassTable")?;

        let clsid = will_jump_to(stream, usize::from(cb_class_table), "SiteClassInfo", |s| {
            read_class_info(s)
        })?;

        match clsid {
            Some(clsid) => {
                debug!(
                    "class table entry {} (cache index {:#x}) is {:?}",
                    self.table.len(),
                    usize::from(CUSTOM_CACHE_INDEX_BASE) + self.table.len(),
                    clsid
                );
                self.table.push(clsid);
            }
            None => trace!("SiteClassInfo at {} has no class id", offset),
        }

        Ok(())
    }
}
