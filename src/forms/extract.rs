use log::{debug, warn};
use serde::Serialize;

use crate::err::DeserializationResult;
use crate::forms::class_table::{CUSTOM_CACHE_INDEX_BASE, ClassTableResolver};
use crate::forms::form_control::{FormControl, read_form_control};
use crate::forms::inkedit::InkEditDecoder;
use crate::forms::property_block::ControlPropertyBlock;
use crate::forms::site::{ControlKind, SiteDescriptor};
use crate::forms::stream::{FormStreamReader, will_jump_to};
use crate::guid::Guid;
use crate::settings::ExtractionSettings;
use crate::utils::ByteCursor;

/// A strategy for decoding the persisted data of one custom control class.
pub trait CustomControlDecoder {
    /// Marker stored on the decoded control.
    fn kind(&self) -> &'static str;
    fn class_id(&self) -> Guid;
    fn decode(
        &self,
        stream: &mut dyn FormStreamReader,
        settings: &ExtractionSettings,
    ) -> DeserializationResult<CustomControl>;
}

/// A custom control decoded from the form data stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomControl {
    pub kind: &'static str,
    pub rich_text: Option<String>,
    /// Plain text recovered from `rich_text`.
    pub text: Option<String>,
    pub properties: ControlPropertyBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FormWarning {
    /// The site's cache index names no known control, or a class table slot that does not exist.
    UnsupportedControlKind { site: usize, cache_index: u16 },
    /// A registered decoder failed on the site's data; the site is returned undecoded.
    ControlDecodeFailed { site: usize, message: String },
    /// The data of this site could not be skipped, so this and later sites are undecoded.
    DataStreamDesynchronized { site: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormExtraction {
    pub sites: Vec<SiteDescriptor>,
    pub warnings: Vec<FormWarning>,
}

/// One forms parsing session.
///
/// The session owns the class table of the form being read and the decoders for custom
/// controls. The InkEdit decoder is registered by default.
pub struct FormExtractor {
    class_table: ClassTableResolver,
    decoders: Vec<Box<dyn CustomControlDecoder>>,
    settings: ExtractionSettings,
}

impl Default for FormExtractor {
    fn default() -> Self {
        FormExtractor::new()
    }
}

impl FormExtractor {
    pub fn new() -> Self {
        FormExtractor {
            class_table: ClassTableResolver::new(),
            decoders: vec![Box::new(InkEditDecoder)],
            settings: ExtractionSettings::default(),
        }
    }

    pub fn with_configuration(mut self, settings: ExtractionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a decoder; it takes precedence over earlier ones for the same class id.
    pub fn register(mut self, decoder: Box<dyn CustomControlDecoder>) -> Self {
        self.decoders.insert(0, decoder);
        self
    }

    /// The class table of the most recently extracted form.
    pub fn class_table(&self) -> &ClassTableResolver {
        &self.class_table
    }

    fn decoder_for(&self, cache_index: u16) -> Option<&dyn CustomControlDecoder> {
        let clsid = self.class_table.resolve(cache_index)?;
        self.decoders
            .iter()
            .find(|d| d.class_id() == *clsid)
            .map(|d| d.as_ref())
    }

    /// Reads a form definition stream, replacing the session's class table with the form's.
    pub fn read_definition(&mut self, form_definition: &[u8]) -> DeserializationResult<FormControl> {
        self.class_table.clear();
        read_form_control(
            &mut ByteCursor::new(form_definition),
            &mut self.class_table,
            self.settings.get_ansi_codec(),
        )
    }

    /// Reads the controls of one form from its definition (`f`) and data (`o`) streams.
    ///
    /// Only a malformed form definition is an error. Problems with individual controls are
    /// reported as warnings.
    pub fn extract(
        &mut self,
        form_definition: &[u8],
        form_data: &[u8],
    ) -> DeserializationResult<FormExtraction> {
        let form = self.read_definition(form_definition)?;
        debug!(
            "form has {} sites and {} class table entries",
            form.sites.len(),
            self.class_table.len()
        );

        let mut sites = form.sites;
        let mut warnings = Vec::new();
        let mut data = ByteCursor::new(form_data);

        for (index, site) in sites.iter_mut().enumerate() {
            let start = data.pos();
            let size = site.object_stream_size.map(|s| s as usize);

            match site.kind {
                ControlKind::Unsupported(cache_index) => {
                    warn!(
                        "site {} ({:?}) has unsupported cache index {}",
                        index, site.name, cache_index
                    );
                    warnings.push(FormWarning::UnsupportedControlKind {
                        site: index,
                        cache_index,
                    });
                }
                ControlKind::Custom(cache_index)
                    if self.class_table.resolve(cache_index).is_none() =>
                {
                    warn!(
                        "site {} ({:?}) refers to class table slot {} of {}",
                        index,
                        site.name,
                        cache_index.saturating_sub(CUSTOM_CACHE_INDEX_BASE),
                        self.class_table.len()
                    );
                    warnings.push(FormWarning::UnsupportedControlKind {
                        site: index,
                        cache_index,
                    });
                }
                _ => {}
            }

            let decoder = match site.kind {
                ControlKind::Custom(cache_index) => self.decoder_for(cache_index),
                _ => None,
            };

            let synchronized = match (decoder, size) {
                (Some(decoder), Some(size)) => {
                    match will_jump_to(&mut data, size, "custom control data", |s| {
                        decoder.decode(s, &self.settings)
                    }) {
                        Ok(custom) => {
                            site.custom = Some(custom);
                            true
                        }
                        Err(e) => {
                            warn!("failed to decode {} at site {}: {}", decoder.kind(), index, e);
                            warnings.push(FormWarning::ControlDecodeFailed {
                                site: index,
                                message: e.to_string(),
                            });
                            e.is_recoverable()
                                && data
                                    .seek_forward(start.saturating_add(size), "control data end")
                                    .is_ok()
                        }
                    }
                }
                (Some(decoder), None) => match decoder.decode(&mut data, &self.settings) {
                    Ok(custom) => {
                        site.custom = Some(custom);
                        true
                    }
                    Err(e) => {
                        warn!("failed to decode {} at site {}: {}", decoder.kind(), index, e);
                        warnings.push(FormWarning::ControlDecodeFailed {
                            site: index,
                            message: e.to_string(),
                        });
                        false
                    }
                },
                (None, Some(size)) => {
                    debug!("skipping {:?} data of site {} ({} bytes)", site.kind, index, size);
                    data.seek_forward(start.saturating_add(size), "control data end")
                        .is_ok()
                }
                (None, None) => false,
            };

            if !synchronized {
                warn!(
                    "lost track of the form data stream at site {} (offset {})",
                    index, start
                );
                warnings.push(FormWarning::DataStreamDesynchronized { site: index });
                break;
            }
        }

        Ok(FormExtraction { sites, warnings })
    }
}

/// Extracts one form with a default session.
pub fn extract_form_controls(
    form_definition: &[u8],
    form_data: &[u8],
) -> DeserializationResult<FormExtraction> {
    FormExtractor::new().extract(form_definition, form_data)
}
