use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use log::warn;
use serde::Serialize;

pub const BML_HEADER_MAGIC: [u8; 14] = [
    0x00, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x53, 0x43, 0x42, 0x69, 0x6E,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BmlFileHeader {
    /// Declared total file size.
    pub file_length: u32,
}

impl BmlFileHeader {
    pub fn from_cursor<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<Self> {
        let magic = cursor.array::<14>("file header magic")?;
        if magic != BML_HEADER_MAGIC {
            return Err(DeserializationError::InvalidHeaderMagic { magic });
        }

        let file_length = cursor.u32_named("file length")?;
        if u64::from(file_length) != cursor.len() {
            warn!(
                "File header declares {} bytes, but the source is {} bytes long",
                file_length,
                cursor.len()
            );
        }

        Ok(BmlFileHeader { file_length })
    }
}
