#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]
#![allow(clippy::len_without_is_empty)]

pub use bml_file_header::{BML_HEADER_MAGIC, BmlFileHeader};
pub use bml_parser::{BmlFile, BmlParser, ParserSettings, ReadSeek};
pub use command_table::{Command, CommandProperty, CommandPropertyType, CommandTable};
pub use object_type::ObjectType;
pub use property_type::{PropertyTypeCode, PropertyTypeDescriptor, PropertyTypeLookup};
pub use string_list::StringList;
pub use string_table::{StringEntry, StringTable};
pub use tag_tree::{TagDeserializer, TagNode, Tree, TreeRegionHeader};
pub use utils::ByteCursor;

pub mod bml_file_header;
pub mod bml_parser;
pub mod command_table;
pub mod err;
pub mod object_type;
pub mod property_type;
pub mod string_list;
pub mod string_table;
pub mod tag_tree;

mod utils;

#[cfg(test)]
mod tests;

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
