//! Keyed UTF-16 string table.
//!
//! Layout: `[0x10][u32 length][u32 count]`, then per entry
//! `[u16 id][u16 0x0000][u16 object_type][u16 marker][u16 byte_len][byte_len bytes UTF-16LE]`.
//!
//! The per-entry marker is normally `0x1000` but is not validated; files in the wild carry
//! other values there.

use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::object_type::ObjectType;
use crate::utils::ByteCursor;

use hashbrown::HashMap as FastMap;
use log::{debug, trace};
use serde::Serialize;

const SECTION: &str = "string table";
const SECTION_TAG: u8 = 0x10;
const EXPECTED_ENTRY_MARKER: u16 = 0x1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringEntry {
    pub id: u16,
    pub object_type: ObjectType,
    pub marker: u16,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringTable {
    pub length: u32,
    pub entries: Vec<StringEntry>,
    #[serde(skip)]
    by_id: FastMap<u16, usize, ahash::RandomState>,
}

impl StringTable {
    pub fn from_cursor<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<Self> {
        let start = cursor.position();

        let tag = cursor.u8_named("string table tag")?;
        if tag != SECTION_TAG {
            return Err(DeserializationError::InvalidSectionHeader {
                section: SECTION,
                offset: start,
                expected: SECTION_TAG,
                found: tag,
            });
        }

        let length = cursor.u32_named("string table length")?;
        let count = cursor.u32_named("string table count")?;
        debug!(
            "String table at `0x{:08x}`: {} bytes, {} entries",
            start, length, count
        );

        let mut table = StringTable {
            length,
            ..Default::default()
        };

        for _ in 0..count {
            let entry = Self::read_entry(cursor)?;
            table.by_id.insert(entry.id, table.entries.len());
            table.entries.push(entry);
        }

        Ok(table)
    }

    fn read_entry<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<StringEntry> {
        let entry_offset = cursor.position();
        let id = cursor.u16_named("string id")?;

        let reserved_offset = cursor.position();
        let reserved = cursor.u16_named("string reserved word")?;
        if reserved != 0 {
            return Err(DeserializationError::InvalidFormat {
                what: "string reserved word",
                offset: reserved_offset,
                expected: "0x0000",
                found: u32::from(reserved),
            });
        }

        let object_type = ObjectType::from_u16(cursor.u16_named("string object type")?);
        let marker = cursor.u16_named("string marker")?;
        if marker != EXPECTED_ENTRY_MARKER {
            debug!(
                "String entry at `0x{:08x}` has marker 0x{:04X}, ignoring",
                entry_offset, marker
            );
        }

        let byte_len = cursor.u16_named("string byte length")?;
        let value = cursor.utf16_by_byte_len(usize::from(byte_len), "string value")?;
        trace!("String 0x{:04X} ({}): {:?}", id, object_type, value);

        Ok(StringEntry {
            id,
            object_type,
            marker,
            value,
        })
    }

    /// Text of the string with the given id.
    pub fn lookup_string(&self, id: u16) -> Option<&str> {
        self.get(id).map(|entry| entry.value.as_str())
    }

    pub fn get(&self, id: u16) -> Option<&StringEntry> {
        self.by_id.get(&id).map(|&index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
