use std::vec::IntoIter;

use log::{debug, trace, warn};

use crate::err::{DeserializationError, DeserializationResult};
use crate::officeart::blip::{ImageRecord, read_blip_store_entry};
use crate::officeart::picture::PictureHeader;
use crate::officeart::record_header::{RECORD_HEADER_SIZE, RecordHeader, RecordType};
use crate::settings::ExtractionSettings;
use crate::utils::ByteCursor;

/// Smallest element size that still moves the walker forward (the size field itself).
pub const MIN_ELEMENT_SIZE: u32 = 4;

/// Walks the picture elements of a graphics data stream and yields the images they embed.
///
/// ```
/// use olecarve::OfficeArtParser;
///
/// let stream: Vec<u8> = Vec::new();
/// let parser = OfficeArtParser::from_buffer(&stream);
/// assert_eq!(parser.images().count(), 0);
/// ```
pub struct OfficeArtParser<'a> {
    data: &'a [u8],
    config: ExtractionSettings,
}

impl<'a> OfficeArtParser<'a> {
    pub fn from_buffer(buffer: &'a [u8]) -> Self {
        OfficeArtParser {
            data: buffer,
            config: ExtractionSettings::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: ExtractionSettings) -> Self {
        self.config = configuration;
        self
    }

    /// Images in stream order.
    ///
    /// A failure inside an element is yielded as an `Err` and iteration resumes at the next
    /// element. A failure to read an element size ends the iteration after being yielded.
    pub fn images(&self) -> IterImages<'_> {
        IterImages {
            data: self.data,
            settings: &self.config,
            offset: 0,
            element_images: Vec::new().into_iter(),
            exhausted: false,
        }
    }
}

pub struct IterImages<'a> {
    data: &'a [u8],
    settings: &'a ExtractionSettings,
    offset: usize,
    element_images: IntoIter<DeserializationResult<ImageRecord>>,
    exhausted: bool,
}

impl Iterator for IterImages<'_> {
    type Item = DeserializationResult<ImageRecord>;

    fn next(&mut self) -> Option<<Self as Iterator>::Item> {
        loop {
            if let Some(next) = self.element_images.next() {
                return Some(next);
            }

            if self.exhausted || self.offset >= self.data.len() {
                return None;
            }

            let mut found = Vec::new();
            if let Err(e) = self.walk_element(&mut found) {
                debug!("stopping at element {}: {}", self.offset, e);
                self.exhausted = true;
                found.push(Err(e));
            }
            self.element_images = found.into_iter();
        }
    }
}

impl IterImages<'_> {
    /// Walks one element and moves `offset` past it.
    ///
    /// Only errors that leave no way to find the next element are returned; everything else
    /// is pushed to `out`.
    fn walk_element(
        &mut self,
        out: &mut Vec<DeserializationResult<ImageRecord>>,
    ) -> DeserializationResult<()> {
        let start = self.offset;
        let mut cursor = ByteCursor::with_pos(self.data, start)?;
        let size = cursor.u32_named("picture lcb")?;
        if size < MIN_ELEMENT_SIZE {
            return Err(DeserializationError::schema(
                "picture lcb",
                start,
                format!("element size {} cannot advance the stream", size),
            ));
        }

        let end = start.saturating_add(size as usize);
        if end > self.data.len() {
            warn!(
                "element at {} declares {} bytes but only {} remain",
                start,
                size,
                self.data.len() - start
            );
        }
        self.offset = end;

        let mut element = cursor.bounded(end);
        let header = match PictureHeader::from_cursor(&mut element, self.settings.get_ansi_codec())
        {
            Ok(header) => header,
            Err(DeserializationError::StructuralMismatch {
                what, expected, found, ..
            }) => {
                debug!(
                    "skipping element at {} ({} bytes): {} is {:#x}, expected {}",
                    start, size, what, found, expected
                );
                return Ok(());
            }
            Err(e) => {
                out.push(Err(e));
                return Ok(());
            }
        };

        debug!("walking picture element at {} ({} bytes)", start, size);
        walk_records(
            &mut element,
            0,
            self.settings,
            header.name.as_deref(),
            out,
        );

        Ok(())
    }
}

/// Walks sibling records until the cursor's boundary, descending into containers when enabled.
fn walk_records(
    cursor: &mut ByteCursor,
    depth: usize,
    settings: &ExtractionSettings,
    picture_name: Option<&str>,
    out: &mut Vec<DeserializationResult<ImageRecord>>,
) {
    while cursor.remaining() >= RECORD_HEADER_SIZE {
        let record_start = cursor.pos();
        let header = match RecordHeader::from_cursor(cursor) {
            Ok(header) => header,
            Err(e) => {
                out.push(Err(e));
                return;
            }
        };
        let record_end = header.content_end(record_start).min(cursor.len());

        if header.content_end(record_start) > cursor.len() {
            warn!(
                "record {:#06x} at {} overruns its parent by {} bytes, clamping",
                header.record_type,
                record_start,
                header.content_end(record_start) - cursor.len()
            );
        }

        match header.kind() {
            RecordType::Fbse => {
                let mut entry = cursor.bounded(record_end);
                match read_blip_store_entry(&mut entry, settings, picture_name) {
                    Ok(Some(image)) => out.push(Ok(image)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("failed to reconstruct image from FBSE at {}: {}", record_start, e);
                        let recoverable = e.is_recoverable();
                        out.push(Err(e));
                        if !recoverable {
                            return;
                        }
                    }
                }
            }
            _ if header.is_container() && settings.should_descend_into_containers() => {
                if depth >= settings.get_max_container_depth() {
                    warn!(
                        "container {:#06x} at {} exceeds nesting depth {}, skipping",
                        header.record_type,
                        record_start,
                        settings.get_max_container_depth()
                    );
                } else {
                    trace!(
                        "descending into container {:#06x} at {}",
                        header.record_type, record_start
                    );
                    let mut children = cursor.bounded(record_end);
                    walk_records(&mut children, depth + 1, settings, picture_name, out);
                }
            }
            other => {
                trace!(
                    "skipping {:?} record at {} ({} bytes)",
                    other, record_start, header.length
                );
            }
        }

        if let Err(e) = cursor.seek_forward(record_end, "record end") {
            out.push(Err(e));
            return;
        }
    }

    if !cursor.is_at_end() {
        trace!(
            "{} trailing bytes at {} do not hold a record header",
            cursor.remaining(),
            cursor.pos()
        );
    }
}
