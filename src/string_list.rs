//! The unindexed string list that follows the file header.
//!
//! Layout: `[0x02][u32 length][0x01][u8 count]`, then `count` × `[0x01][u16 len][len bytes]`.
//! `length` covers the whole section, starting at the `0x02` tag.

use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use encoding::{DecoderTrap, EncodingRef};
use log::{debug, trace};
use serde::Serialize;

const SECTION: &str = "unknown string list";
const SECTION_TAG: u8 = 0x02;
const ENTRY_MARKER: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StringList {
    pub length: u32,
    pub strings: Vec<String>,
}

impl StringList {
    pub fn from_cursor<R: ReadSeek>(
        cursor: &mut ByteCursor<R>,
        ansi_codec: EncodingRef,
    ) -> DeserializationResult<Self> {
        let start = cursor.position();

        let tag = cursor.u8_named("string list tag")?;
        if tag != SECTION_TAG {
            return Err(DeserializationError::InvalidSectionHeader {
                section: SECTION,
                offset: start,
                expected: SECTION_TAG,
                found: tag,
            });
        }

        let length = cursor.u32_named("string list length")?;
        expect_marker(cursor, "string list marker")?;
        let count = cursor.u8_named("string list count")?;

        debug!(
            "String list at `0x{:08x}`: {} bytes, {} strings",
            start, length, count
        );

        let mut strings = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            expect_marker(cursor, "string entry marker")?;
            let len = cursor.u16_named("string entry length")?;

            let offset = cursor.position();
            let raw = cursor.take_bytes(usize::from(len), "string entry")?;
            let s = ansi_codec
                .decode(&raw, DecoderTrap::Strict)
                .map_err(|m| DeserializationError::InvalidAnsiString {
                    encoding: ansi_codec.name(),
                    message: m.to_string(),
                    offset,
                })?;

            trace!("\t{:?}", s);
            strings.push(s);
        }

        let consumed = cursor.position() - start;
        if consumed != u64::from(length) {
            return Err(DeserializationError::InvalidSectionLength {
                section: SECTION,
                offset: start,
                declared: length,
                consumed,
            });
        }

        Ok(StringList { length, strings })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn expect_marker<R: ReadSeek>(
    cursor: &mut ByteCursor<R>,
    what: &'static str,
) -> DeserializationResult<()> {
    let offset = cursor.position();
    let marker = cursor.u8_named(what)?;
    if marker != ENTRY_MARKER {
        return Err(DeserializationError::InvalidFormat {
            what,
            offset,
            expected: "0x01",
            found: u32::from(marker),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::encode_string_list;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> DeserializationResult<StringList> {
        let mut cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        StringList::from_cursor(&mut cursor, encoding::all::WINDOWS_1252)
    }

    #[test]
    fn test_parses_string_list() {
        let bytes = encode_string_list(&["APPLICATION_RIBBON", "TabHome"]);
        let list = parse(&bytes).unwrap();

        assert_eq!(list.length as usize, bytes.len());
        assert_eq!(list.strings, vec!["APPLICATION_RIBBON", "TabHome"]);
        assert_eq!(list.get(1), Some("TabHome"));
    }

    #[test]
    fn test_decodes_with_ansi_codec() {
        let mut bytes = encode_string_list(&["x"]);
        // Replace `x` with 0xE9, which is `é` in windows-1252.
        let last = bytes.len() - 1;
        bytes[last] = 0xE9;

        assert_eq!(parse(&bytes).unwrap().strings, vec!["é"]);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut bytes = encode_string_list(&["abc"]);
        bytes[1] += 1;

        let err = parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidSectionLength { offset: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_bad_entry_marker() {
        let mut bytes = encode_string_list(&["abc"]);
        bytes[7] = 0x05;

        let err = parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidFormat {
                what: "string entry marker",
                offset: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_wrong_tag() {
        let err = parse(&[0x03, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidSectionHeader {
                expected: 0x02,
                found: 0x03,
                ..
            }
        ));
    }
}
