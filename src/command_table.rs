//! The `Application.Commands` table: per-command property lists keyed by command id.
//!
//! Layout: `[0x0F][u32 count]`, then per command `[u16 id][u16 0x0000][u8 n]` followed by `n`
//! properties of `[u8 type][u32 value][aux bytes]`. The number of aux bytes depends on the
//! property type (see [`CommandPropertyType::data_len`]); at most 4 of them are kept.

use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use hashbrown::HashMap as FastMap;
use log::{debug, trace};
use serde::Serialize;

const SECTION: &str = "command table";
const SECTION_TAG: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandPropertyType {
    LabelTitle,
    LabelDescription,
    SmallHighContrastImages,
    LargeHighContrastImages,
    SmallImages,
    LargeImages,
    Keytip,
    TooltipTitle,
    TooltipDescription,
    Unknown(u8),
}

impl CommandPropertyType {
    pub fn from_u8(byte: u8) -> CommandPropertyType {
        match byte {
            0x01 => CommandPropertyType::LabelTitle,
            0x02 => CommandPropertyType::LabelDescription,
            0x03 => CommandPropertyType::SmallHighContrastImages,
            0x04 => CommandPropertyType::LargeHighContrastImages,
            0x05 => CommandPropertyType::SmallImages,
            0x06 => CommandPropertyType::LargeImages,
            0x07 => CommandPropertyType::Keytip,
            0x08 => CommandPropertyType::TooltipTitle,
            0x09 => CommandPropertyType::TooltipDescription,
            other => CommandPropertyType::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            CommandPropertyType::LabelTitle => 0x01,
            CommandPropertyType::LabelDescription => 0x02,
            CommandPropertyType::SmallHighContrastImages => 0x03,
            CommandPropertyType::LargeHighContrastImages => 0x04,
            CommandPropertyType::SmallImages => 0x05,
            CommandPropertyType::LargeImages => 0x06,
            CommandPropertyType::Keytip => 0x07,
            CommandPropertyType::TooltipTitle => 0x08,
            CommandPropertyType::TooltipDescription => 0x09,
            CommandPropertyType::Unknown(other) => other,
        }
    }

    /// Total data length (value + aux). `None` for unknown types, which carry no aux bytes.
    pub fn data_len(self) -> Option<usize> {
        match self {
            CommandPropertyType::SmallHighContrastImages
            | CommandPropertyType::LargeHighContrastImages
            | CommandPropertyType::SmallImages
            | CommandPropertyType::LargeImages => Some(6),
            CommandPropertyType::Unknown(_) => None,
            _ => Some(4),
        }
    }

    /// Aux bytes that follow the `u32` value in the stream.
    pub fn aux_len(self) -> usize {
        self.data_len().map_or(0, |len| len.saturating_sub(4))
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandPropertyType::LabelTitle => "Command.LabelTitle",
            CommandPropertyType::LabelDescription => "Command.LabelDescription",
            CommandPropertyType::SmallHighContrastImages => "Command.SmallHighContrastImages",
            CommandPropertyType::LargeHighContrastImages => "Command.LargeHighContrastImages",
            CommandPropertyType::SmallImages => "Command.SmallImages",
            CommandPropertyType::LargeImages => "Command.LargeImages",
            CommandPropertyType::Keytip => "Command.Keytip",
            CommandPropertyType::TooltipTitle => "Command.TooltipTitle",
            CommandPropertyType::TooltipDescription => "Command.TooltipDescription",
            CommandPropertyType::Unknown(_) => "Unknown Type",
        }
    }
}

/// Display name of a command property type.
pub fn lookup_property_name(property_type: u8) -> &'static str {
    CommandPropertyType::from_u8(property_type).name()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandProperty {
    pub property_type: CommandPropertyType,
    pub value: u32,
    /// Up to 4 aux bytes, zero-extended.
    pub aux_data: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub id: u16,
    pub properties: Vec<CommandProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandTable {
    pub commands: Vec<Command>,
    #[serde(skip)]
    by_id: FastMap<u16, usize, ahash::RandomState>,
}

impl CommandTable {
    pub fn from_cursor<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<Self> {
        let start = cursor.position();

        let tag = cursor.u8_named("command table tag")?;
        if tag != SECTION_TAG {
            return Err(DeserializationError::InvalidSectionHeader {
                section: SECTION,
                offset: start,
                expected: SECTION_TAG,
                found: tag,
            });
        }

        let count = cursor.u32_named("command count")?;
        debug!("Command table at `0x{:08x}`: {} commands", start, count);

        let mut table = CommandTable::default();
        for _ in 0..count {
            let command = Self::read_command(cursor)?;
            table.by_id.insert(command.id, table.commands.len());
            table.commands.push(command);
        }

        Ok(table)
    }

    fn read_command<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<Command> {
        let id = cursor.u16_named("command id")?;

        let reserved_offset = cursor.position();
        let reserved = cursor.u16_named("command reserved word")?;
        if reserved != 0 {
            return Err(DeserializationError::InvalidFormat {
                what: "command reserved word",
                offset: reserved_offset,
                expected: "0x0000",
                found: u32::from(reserved),
            });
        }

        let property_count = cursor.u8_named("command property count")?;
        trace!("Command 0x{:04X}: {} properties", id, property_count);

        let mut properties = Vec::with_capacity(usize::from(property_count));
        for _ in 0..property_count {
            let property_type = CommandPropertyType::from_u8(cursor.u8_named("property type")?);
            let value = cursor.u32_named("property value")?;
            let aux_data = match property_type.aux_len() {
                0 => 0,
                len => cursor.uint_le_named(len.min(4), "property aux data")?,
            };

            properties.push(CommandProperty {
                property_type,
                value,
                aux_data,
            });
        }

        Ok(Command { id, properties })
    }

    pub fn get(&self, id: u16) -> Option<&Command> {
        self.by_id.get(&id).map(|&index| &self.commands[index])
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
