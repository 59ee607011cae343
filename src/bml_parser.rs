use crate::bml_file_header::BmlFileHeader;
use crate::command_table::{CommandTable, lookup_property_name};
use crate::err::{BmlError, Result};
use crate::string_list::StringList;
use crate::string_table::StringTable;
use crate::tag_tree::{TagDeserializer, Tree, TreeRegionHeader};
use crate::utils::ByteCursor;

use encoding::EncodingRef;
use log::{debug, info};
use serde::Serialize;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;

pub const DEFAULT_MAX_DEPTH: usize = 64;

// Inspired by https://github.com/mitsuhiko/unbox/src/formats/cab.rs
pub trait ReadSeek: Read + Seek {
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }
}

impl<T: Read + Seek> ReadSeek for T {}

#[derive(Clone)]
pub struct ParserSettings {
    /// Deepest tag nesting accepted before decoding fails.
    max_depth: usize,
    /// Total tags decoded per file (main tree and every supplementary collection).
    max_tags: Option<usize>,
    resolve_pointers: bool,
    /// Codec used for the single-byte strings of the unknown string list.
    ansi_codec: EncodingRef,
}

impl fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("max_depth", &self.max_depth)
            .field("max_tags", &self.max_tags)
            .field("resolve_pointers", &self.resolve_pointers)
            .field("ansi_codec", &self.ansi_codec.name())
            .finish()
    }
}

impl PartialEq for ParserSettings {
    fn eq(&self, other: &ParserSettings) -> bool {
        self.ansi_codec.name() == other.ansi_codec.name()
            && self.max_depth == other.max_depth
            && self.max_tags == other.max_tags
            && self.resolve_pointers == other.resolve_pointers
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            max_depth: DEFAULT_MAX_DEPTH,
            max_tags: None,
            resolve_pointers: true,
            ansi_codec: encoding::all::WINDOWS_1252,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// `None` means no limit.
    pub fn max_tags(mut self, max_tags: Option<usize>) -> Self {
        self.max_tags = max_tags;
        self
    }

    /// When disabled, pointers are collected but left unresolved.
    pub fn resolve_pointers(mut self, resolve_pointers: bool) -> Self {
        self.resolve_pointers = resolve_pointers;
        self
    }

    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;
        self
    }

    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn get_max_tags(&self) -> Option<usize> {
        self.max_tags
    }

    pub fn should_resolve_pointers(&self) -> bool {
        self.resolve_pointers
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }
}

/// A fully decoded BML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BmlFile {
    pub header: BmlFileHeader,
    pub strings: StringList,
    pub commands: CommandTable,
    pub string_table: StringTable,
    pub region: TreeRegionHeader,
    pub tree: Tree,
}

impl BmlFile {
    pub fn lookup_string(&self, id: u16) -> Option<&str> {
        self.string_table.lookup_string(id)
    }

    pub fn lookup_property_name(&self, property_type: u8) -> &'static str {
        lookup_property_name(property_type)
    }

    /// Byte range of the main tag tree, from the root tag up to the supplementary section.
    pub fn tree_region(&self) -> (u64, u64) {
        (
            self.region.tree_start,
            u64::from(self.region.supplementary_offset),
        )
    }
}

pub struct BmlParser<T: ReadSeek> {
    data: T,
    config: ParserSettings,
}

impl<T: ReadSeek> fmt::Debug for BmlParser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BmlParser")
            .field("config", &self.config)
            .finish()
    }
}

impl BmlParser<BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| BmlError::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;

        Ok(Self::from_read_seek(BufReader::new(f)))
    }
}

impl BmlParser<Cursor<Vec<u8>>> {
    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        Self::from_read_seek(Cursor::new(buffer))
    }
}

impl<T: ReadSeek> BmlParser<T> {
    pub fn from_read_seek(read_seek: T) -> Self {
        BmlParser {
            data: read_seek,
            config: ParserSettings::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    /// Decodes the whole file: header, the three flat tables, the tag tree, and (unless
    /// disabled) every supplementary collection reachable through pointers.
    ///
    /// No partial result is returned on failure; the error names the section and the offset.
    pub fn parse(self) -> Result<BmlFile> {
        let mut cursor =
            ByteCursor::new(self.data).map_err(BmlError::in_section("file header"))?;

        let header =
            BmlFileHeader::from_cursor(&mut cursor).map_err(BmlError::in_section("file header"))?;
        debug!("BML header: {:?}", header);

        let strings = StringList::from_cursor(&mut cursor, self.config.get_ansi_codec())
            .map_err(BmlError::in_section("unknown string list"))?;
        let commands =
            CommandTable::from_cursor(&mut cursor).map_err(BmlError::in_section("command table"))?;
        let string_table =
            StringTable::from_cursor(&mut cursor).map_err(BmlError::in_section("string table"))?;

        let region = TreeRegionHeader::from_cursor(&mut cursor)
            .map_err(BmlError::in_section("tag tree"))?;
        debug!(
            "Tag tree at `0x{:08x}`, supplementary section at `0x{:08x}`",
            region.tree_start, region.supplementary_offset
        );

        let mut deserializer = TagDeserializer::with_settings(cursor, &self.config);
        let root = deserializer
            .decode_root()
            .map_err(BmlError::in_section("tag tree"))?;

        if self.config.should_resolve_pointers() {
            deserializer
                .resolve_all()
                .map_err(BmlError::in_section("pointer resolution"))?;
        }

        let tree = deserializer.into_tree(root);
        info!(
            "Decoded {} commands, {} strings, {} pointers ({} unresolved), {} diagnostics",
            commands.len(),
            string_table.len(),
            tree.pointers.len(),
            tree.pointers.unresolved_count(),
            tree.diagnostics.len()
        );

        Ok(BmlFile {
            header,
            strings,
            commands,
            string_table,
            region,
            tree,
        })
    }
}
