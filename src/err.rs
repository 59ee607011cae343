use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BmlError>;
pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;

/// Errors raised while decoding the byte stream.
///
/// Every variant records the byte offset at which the violated invariant was detected.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("offset 0x{offset:08x}: input truncated while reading {what} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("offset 0x{offset:08x}: invalid {what}, expected {expected}, found 0x{found:x}")]
    InvalidFormat {
        what: &'static str,
        offset: u64,
        expected: &'static str,
        found: u32,
    },

    #[error("offset 0x{offset:08x}: tried to read an invalid byte `0x{value:02x}` as a tag discriminator")]
    UnknownTagDiscriminator { value: u8, offset: u64 },

    #[error("offset 0x{offset:08x}: expected {expected} tag, found discriminator `0x{found:02x}`")]
    UnexpectedVariant {
        expected: &'static str,
        found: u8,
        offset: u64,
    },

    #[error("cannot seek to offset 0x{offset:08x} for {what}, source is {len} bytes long")]
    SeekOutOfRange {
        what: &'static str,
        offset: u64,
        len: u64,
    },

    #[error("offset 0x{offset:08x}: {what} exceeded the configured limit of {limit}")]
    ResourceExhausted {
        what: &'static str,
        offset: u64,
        limit: usize,
    },

    #[error("invalid BML header magic, found `{magic:02X?}`")]
    InvalidHeaderMagic { magic: [u8; 14] },

    #[error("offset 0x{offset:08x}: invalid {section} section header byte `0x{found:02x}`, expected `0x{expected:02x}`")]
    InvalidSectionHeader {
        section: &'static str,
        offset: u64,
        expected: u8,
        found: u8,
    },

    #[error("{section} section declares {declared} bytes, but {consumed} bytes were read (section starts at offset 0x{offset:08x})")]
    InvalidSectionLength {
        section: &'static str,
        offset: u64,
        declared: u32,
        consumed: u64,
    },

    #[error("offset 0x{offset:08x}: failed to decode UTF-16 string for {what}")]
    InvalidUtf16String { what: &'static str, offset: u64 },

    #[error("offset 0x{offset:08x}: failed to decode ansi string (used encoding scheme {encoding}): {message}")]
    InvalidAnsiString {
        encoding: &'static str,
        message: String,
        offset: u64,
    },

    #[error("offset 0x{offset:08x}: an I/O error has occurred: {source}")]
    Io { source: io::Error, offset: u64 },
}

impl DeserializationError {
    /// Offset in the source at which the error was detected.
    pub fn offset(&self) -> u64 {
        match self {
            DeserializationError::Truncated { offset, .. }
            | DeserializationError::InvalidFormat { offset, .. }
            | DeserializationError::UnknownTagDiscriminator { offset, .. }
            | DeserializationError::UnexpectedVariant { offset, .. }
            | DeserializationError::SeekOutOfRange { offset, .. }
            | DeserializationError::ResourceExhausted { offset, .. }
            | DeserializationError::InvalidSectionHeader { offset, .. }
            | DeserializationError::InvalidSectionLength { offset, .. }
            | DeserializationError::InvalidUtf16String { offset, .. }
            | DeserializationError::InvalidAnsiString { offset, .. }
            | DeserializationError::Io { offset, .. } => *offset,
            DeserializationError::InvalidHeaderMagic { .. } => 0,
        }
    }
}

/// Top-level errors returned by [`crate::BmlParser`].
#[derive(Debug, Error)]
pub enum BmlError {
    #[error("Failed to open file {}: {source}", path.display())]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error("Failed to parse {section}, caused by:\n\t {source}")]
    FailedToParseSection {
        section: &'static str,
        #[source]
        source: DeserializationError,
    },

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),
}

impl BmlError {
    pub(crate) fn in_section(section: &'static str) -> impl FnOnce(DeserializationError) -> Self {
        move |source| BmlError::FailedToParseSection { section, source }
    }

    /// Offset of the failing byte, when the error came from decoding.
    pub fn offset(&self) -> Option<u64> {
        match self {
            BmlError::FailedToParseSection { source, .. } => Some(source.offset()),
            _ => None,
        }
    }
}
