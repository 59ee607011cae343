//! Catalog of tag-tree property types.
//!
//! A `Prop` tag carries a 3-byte type code. The code determines how many payload bytes follow,
//! so an unknown code cannot simply be skipped: every sibling after it depends on guessing the
//! payload length correctly. Known codes are looked up in [`PROPERTY_TYPES`]; unknown codes go
//! through [`PropertyTypeDescriptor::infer`].

use serde::Serialize;
use std::fmt;

/// The 3 type bytes following a `Prop` discriminator, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PropertyTypeCode(pub u8, pub u8, pub u8);

impl PropertyTypeCode {
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        PropertyTypeCode(bytes[0], bytes[1], bytes[2])
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

impl fmt::Display for PropertyTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyTypeDescriptor {
    pub type_code: PropertyTypeCode,
    pub payload_len: u32,
    pub name: &'static str,
}

/// Where a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTypeLookup {
    Known(&'static PropertyTypeDescriptor),
    /// The code is absent from the catalog; the length was guessed.
    Inferred(PropertyTypeDescriptor),
}

impl PropertyTypeLookup {
    pub fn descriptor(&self) -> &PropertyTypeDescriptor {
        match self {
            PropertyTypeLookup::Known(d) => d,
            PropertyTypeLookup::Inferred(d) => d,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PropertyTypeLookup::Known(_))
    }
}

pub const UNKNOWN_PROPERTY_NAME: &str = "Unknown Property";

pub static PROPERTY_TYPES: &[PropertyTypeDescriptor] = &[
    PropertyTypeDescriptor {
        type_code: PropertyTypeCode(0x01, 0x00, 0x02),
        payload_len: 4,
        name: "UInt32",
    },
    PropertyTypeDescriptor {
        type_code: PropertyTypeCode(0x01, 0x00, 0x03),
        payload_len: 2,
        name: "UInt16",
    },
    PropertyTypeDescriptor {
        type_code: PropertyTypeCode(0x01, 0x00, 0x04),
        payload_len: 1,
        name: "UInt8",
    },
];

impl PropertyTypeDescriptor {
    /// Exact lookup, falling back to [`PropertyTypeDescriptor::infer`] on a miss.
    pub fn lookup(type_code: PropertyTypeCode) -> PropertyTypeLookup {
        match PROPERTY_TYPES.iter().find(|d| d.type_code == type_code) {
            Some(descriptor) => PropertyTypeLookup::Known(descriptor),
            None => PropertyTypeLookup::Inferred(Self::infer(type_code)),
        }
    }

    /// Guesses the payload length of a code missing from the catalog.
    ///
    /// The third byte is a width class (`0x02` → 4, `0x03` → 2, `0x04` → 1). Codes in the
    /// `0x01` family with any other width class are a single byte wide. For everything else,
    /// the first byte is taken as the payload length.
    pub fn infer(type_code: PropertyTypeCode) -> PropertyTypeDescriptor {
        let PropertyTypeCode(b1, _, b3) = type_code;

        let payload_len = match (b1, b3) {
            (_, 0x02) => 4,
            (_, 0x03) => 2,
            (_, 0x04) => 1,
            (0x01, _) => 1,
            (len, _) => u32::from(len),
        };

        PropertyTypeDescriptor {
            type_code,
            payload_len,
            name: UNKNOWN_PROPERTY_NAME,
        }
    }
}

/// Display name for a property type code (diagnostics only).
pub fn lookup_property_type_name(type_code: PropertyTypeCode) -> &'static str {
    PropertyTypeDescriptor::lookup(type_code).descriptor().name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        for (code, len) in [
            (PropertyTypeCode(0x01, 0x00, 0x02), 4),
            (PropertyTypeCode(0x01, 0x00, 0x03), 2),
            (PropertyTypeCode(0x01, 0x00, 0x04), 1),
        ] {
            let lookup = PropertyTypeDescriptor::lookup(code);
            assert!(lookup.is_known(), "{} should be in the catalog", code);
            assert_eq!(lookup.descriptor().payload_len, len);
        }
    }

    #[test]
    fn test_unknown_codes_use_width_class() {
        let cases = [
            (PropertyTypeCode(0x99, 0x00, 0x02), 4),
            (PropertyTypeCode(0x99, 0x00, 0x03), 2),
            (PropertyTypeCode(0x99, 0x00, 0x04), 1),
        ];

        for (code, len) in cases {
            let lookup = PropertyTypeDescriptor::lookup(code);
            assert!(!lookup.is_known());
            assert_eq!(lookup.descriptor().payload_len, len, "code {}", code);
            assert_eq!(lookup.descriptor().name, UNKNOWN_PROPERTY_NAME);
        }
    }

    #[test]
    fn test_unknown_prop_family_defaults_to_one_byte() {
        let d = PropertyTypeDescriptor::infer(PropertyTypeCode(0x01, 0x07, 0x11));
        assert_eq!(d.payload_len, 1);
    }

    #[test]
    fn test_unknown_code_falls_back_to_first_byte() {
        assert_eq!(
            PropertyTypeDescriptor::infer(PropertyTypeCode(0x08, 0x00, 0x01)).payload_len,
            8
        );
        assert_eq!(
            PropertyTypeDescriptor::infer(PropertyTypeCode(0x00, 0x00, 0x00)).payload_len,
            0
        );
    }
}
