use std::fmt::{self, Debug};

use encoding::{Encoding, EncodingRef};
use encoding::all::WINDOWS_1252;

/// Width of the optional second digest carried by metafile BLIPs whose instance marks it present.
///
/// Writers disagree here: current documents carry a full 16 byte digest, while some older
/// extraction code (and the documents it was validated against) consumed only 6 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryDigest {
    /// 16 bytes.
    Full,
    /// 6 bytes.
    Legacy,
}

impl SecondaryDigest {
    pub fn width(self) -> usize {
        match self {
            SecondaryDigest::Full => 16,
            SecondaryDigest::Legacy => 6,
        }
    }
}

#[derive(Clone)]
pub struct ExtractionSettings {
    metafile_digest: SecondaryDigest,
    ansi_codec: EncodingRef,
    max_container_depth: usize,
    descend_into_containers: bool,
}

impl Debug for ExtractionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionSettings")
            .field("metafile_digest", &self.metafile_digest)
            .field("ansi_codec", &self.ansi_codec.name())
            .field("max_container_depth", &self.max_container_depth)
            .field("descend_into_containers", &self.descend_into_containers)
            .finish()
    }
}

impl PartialEq for ExtractionSettings {
    fn eq(&self, other: &Self) -> bool {
        self.ansi_codec.name() == other.ansi_codec.name()
            && self.metafile_digest == other.metafile_digest
            && self.max_container_depth == other.max_container_depth
            && self.descend_into_containers == other.descend_into_containers
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            metafile_digest: SecondaryDigest::Full,
            ansi_codec: WINDOWS_1252,
            max_container_depth: 16,
            descend_into_containers: false,
        }
    }
}

impl ExtractionSettings {
    pub fn new() -> Self {
        ExtractionSettings::default()
    }

    /// Sets the width of the second metafile digest.
    pub fn metafile_digest(mut self, metafile_digest: SecondaryDigest) -> Self {
        self.metafile_digest = metafile_digest;
        self
    }

    /// Sets the code page used for single-byte form strings and control text.
    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;
        self
    }

    /// Sets how many container records may be nested before the walker stops descending.
    pub fn max_container_depth(mut self, max_container_depth: usize) -> Self {
        self.max_container_depth = max_container_depth;
        self
    }

    /// When enabled, blip store entries nested inside container records are also found.
    /// Off by default: container records are skipped like any other record.
    pub fn descend_into_containers(mut self, descend_into_containers: bool) -> Self {
        self.descend_into_containers = descend_into_containers;
        self
    }

    pub fn get_metafile_digest(&self) -> SecondaryDigest {
        self.metafile_digest
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }

    pub fn get_max_container_depth(&self) -> usize {
        self.max_container_depth
    }

    pub fn should_descend_into_containers(&self) -> bool {
        self.descend_into_containers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding::all::ISO_8859_1;

    #[test]
    fn test_builder_overrides_defaults() {
        let settings = ExtractionSettings::new()
            .metafile_digest(SecondaryDigest::Legacy)
            .ansi_codec(ISO_8859_1)
            .max_container_depth(2)
            .descend_into_containers(true);

        assert_eq!(settings.get_metafile_digest().width(), 6);
        assert_eq!(settings.get_ansi_codec().name(), ISO_8859_1.name());
        assert_eq!(settings.get_max_container_depth(), 2);
        assert!(settings.should_descend_into_containers());
        assert_ne!(settings, ExtractionSettings::default());
    }

    #[test]
    fn test_containers_are_skipped_by_default() {
        assert!(!ExtractionSettings::default().should_descend_into_containers());
    }
}
