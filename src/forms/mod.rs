//! Control extraction from the forms streams of an embedded user form.
//!
//! A form is stored as a definition stream (`f`) declaring the control sites, and a data stream
//! (`o`) holding each control's persisted properties back to back. Built-in controls are only
//! located and skipped. Custom controls are matched to a decoder through the form's class table.

mod class_table;
mod extract;
mod form_control;
mod inkedit;
mod property_block;
mod site;
mod stream;

pub use self::class_table::{
    CUSTOM_CACHE_INDEX_BASE, ClassInfoPropMask, ClassTableResolver, SiteClassInfoParser,
};
pub use self::extract::{
    CustomControl, CustomControlDecoder, FormExtraction, FormExtractor, FormWarning,
    extract_form_controls,
};
pub use self::form_control::{
    FormControl, FormFlags, FormPropMask, STD_FONT_CLSID, STD_PICTURE_CLSID, TEXT_PROPS_CLSID,
};
pub use self::inkedit::{INKEDIT_CLSID, INKEDIT_KIND, INKEDIT_SCHEMA, InkEditDecoder};
pub use self::property_block::{
    ControlPropertyBlock, FieldSpec, PropertyValue, SemanticKind, WireType,
    decode_property_block, font_face_name, rich_text_fragment,
};
pub use self::site::{
    ControlKind, DEFAULT_CLSID_CACHE_INDEX, MorphDataKind, SiteDescriptor, SitePropMask,
};
pub use self::stream::{AlignedBlock, CountOfBytesWithCompressionFlag, FormStreamReader, will_jump_to};
