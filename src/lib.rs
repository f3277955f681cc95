#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Recovery of embedded objects from legacy compound-document streams.
//!
//! Two independent pipelines work on streams already read into memory:
//!
//! - [`officeart`] walks a graphics data stream and rebuilds the images stored in its
//!   blip-store entries.
//! - [`forms`] reads an embedded form's definition and data streams, locates every control site
//!   and decodes custom controls (InkEdit out of the box).
//!
//! Inputs are treated as hostile. Every read is bounds-checked, and a malformed element or
//! control is reported and skipped using the lengths declared around it.

pub mod err;
pub mod forms;
pub mod guid;
pub mod officeart;
mod settings;
mod utils;

pub use err::{DeserializationError, DeserializationResult};
pub use forms::{
    ControlKind, ControlPropertyBlock, CustomControl, CustomControlDecoder, FormExtraction,
    FormExtractor, FormWarning, PropertyValue, SiteDescriptor, extract_form_controls,
};
pub use guid::Guid;
pub use officeart::{
    BlipKind, BlipSubtype, ImageRecord, OfficeArtParser, extract_images, extract_images_with,
};
pub use settings::{ExtractionSettings, SecondaryDigest};

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
