use serde::Serialize;
use std::fmt;

/// Ribbon object types as they appear in `Node` tags and string-table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectType {
    ToggleButton,
    Group,
    Button,
    FileMenu,
    Gallery,
    MenuGroup,
    Tab,
    QuickAccessToolbar,
    Unknown(u16),
}

impl ObjectType {
    pub fn from_u16(value: u16) -> ObjectType {
        match value {
            0x0600 => ObjectType::ToggleButton,
            0x0700 => ObjectType::Group,
            0x0F00 => ObjectType::Button,
            0x1300 => ObjectType::FileMenu,
            0x1500 => ObjectType::Gallery,
            0x1800 => ObjectType::MenuGroup,
            0x1A00 => ObjectType::Tab,
            0x2500 => ObjectType::QuickAccessToolbar,
            other => ObjectType::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            ObjectType::ToggleButton => 0x0600,
            ObjectType::Group => 0x0700,
            ObjectType::Button => 0x0F00,
            ObjectType::FileMenu => 0x1300,
            ObjectType::Gallery => 0x1500,
            ObjectType::MenuGroup => 0x1800,
            ObjectType::Tab => 0x1A00,
            ObjectType::QuickAccessToolbar => 0x2500,
            ObjectType::Unknown(other) => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::ToggleButton => "Toggle Button",
            ObjectType::Group => "Group",
            ObjectType::Button => "Button",
            ObjectType::FileMenu => "\"File\" Menu",
            ObjectType::Gallery => "Gallery",
            ObjectType::MenuGroup => "MenuGroup",
            ObjectType::Tab => "Tab",
            ObjectType::QuickAccessToolbar => "Quick Access Bar (Qat)",
            ObjectType::Unknown(_) => "Unknown Type",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.to_u16())
    }
}
