//! Image extraction from the OfficeArt records stored in a document's graphics data stream.

mod blip;
mod picture;
mod record_header;
mod walker;

pub use self::blip::{
    BlipKind, BlipStoreEntry, BlipSubtype, COMPRESSION_DEFLATE, COMPRESSION_NONE,
    METAFILE_OVERHEAD, METAFILE_SECOND_DIGEST_INSTANCES, ImageRecord, MetafileHeader,
    RASTER_OVERHEAD, RASTER_SECOND_DIGEST_INSTANCES,
};
pub use self::picture::{MM_SHAPE, MM_SHAPEFILE, MetafilePresentation, PictureHeader};
pub use self::record_header::{RecordHeader, RecordType};
pub use self::walker::{IterImages, OfficeArtParser};

use log::warn;

use crate::settings::ExtractionSettings;

/// Every image embedded in `stream`, with extraction failures logged and dropped.
pub fn extract_images(stream: &[u8]) -> Vec<ImageRecord> {
    extract_images_with(stream, ExtractionSettings::default())
}

pub fn extract_images_with(stream: &[u8], settings: ExtractionSettings) -> Vec<ImageRecord> {
    OfficeArtParser::from_buffer(stream)
        .with_configuration(settings)
        .images()
        .filter_map(|image| match image {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("dropping image: {}", e);
                None
            }
        })
        .collect()
}
