//! Runtime message-definition database.
//!
//! Message layouts are data, not code: a JSON file enumerates every message
//! with an ordered list of field descriptors plus the enum dictionaries the
//! fields reference. The database is loaded once and shared read-only by
//! decoders and encoders.
//!
//! The JSON shape:
//!
//! ```json
//! {
//!   "enums": [
//!     { "name": "SolutionStatus",
//!       "values": [ { "value": 0, "name": "SOL_COMPUTED" } ] }
//!   ],
//!   "messages": [
//!     { "name": "BESTPOS", "id": 42, "def_crc": 51978,
//!       "fields": [
//!         { "name": "BESTPOS.eMySolutionStatus", "type": "SolutionStatus",
//!           "base_type": "U32", "storage": "ENUM", "size": 4,
//!           "enum": "SolutionStatus" }
//!       ] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// Primitive type of one field element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseType {
    /// Unsigned 8-bit.
    U8,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// IEEE 754 single.
    F32,
    /// IEEE 754 double.
    F64,
    /// Boolean, stored in the element size the schema declares.
    Bool,
    /// Single character.
    Char,
    /// Unsigned 32-bit rendered as hex in text forms.
    HexU32,
    /// Satellite PRN/slot plus signed frequency channel.
    SatelliteId,
}

/// How a field occupies the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Storage {
    /// One element.
    Simple,
    /// `array_length` elements.
    FixedArray,
    /// 4-byte runtime length, then that many elements (≤ `array_length`).
    VarArray,
    /// NUL-terminated text within `array_length` bytes, padded to 4-byte
    /// alignment on the wire.
    String,
    /// One element whose value resolves through an enum dictionary.
    Enum,
    /// Zero-width grouping marker; children follow as ordinary fields.
    Class,
    /// 4-byte iteration count, then that many repetitions of the next
    /// `child_count` descriptors.
    ClassArray,
}

/// Name of an enum dictionary, as referenced by a field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct EnumRef(pub String);

/// One entry of an enum dictionary.
#[derive(Debug, Clone, Deserialize)]
struct EnumEntry {
    value: u32,
    name: String,
}

/// A value↔name dictionary for one enumeration.
#[derive(Debug, Deserialize)]
pub struct EnumDict {
    /// Enumeration name.
    pub name: String,
    values: Vec<EnumEntry>,
    #[serde(skip)]
    by_value: HashMap<u32, usize>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl EnumDict {
    fn index(&mut self) {
        for (i, e) in self.values.iter().enumerate() {
            self.by_value.insert(e.value, i);
            self.by_name.insert(e.name.clone(), i);
        }
    }

    /// Symbolic name for a value.
    #[must_use]
    pub fn name_of(&self, value: u32) -> Option<&str> {
        self.by_value
            .get(&value)
            .map(|&i| self.values[i].name.as_str())
    }

    /// Value for a symbolic name.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&i| self.values[i].value)
    }
}

/// One field of a message definition. Order within [`MessageDef::fields`]
/// is wire order.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    /// Dotted element name; the JSON projection keys on the last segment.
    pub name: String,
    /// Schema-level type name (informational).
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Primitive element type.
    pub base_type: BaseType,
    /// Wire occupancy.
    pub storage: Storage,
    /// Size of one element in bytes.
    #[serde(rename = "size")]
    pub element_size: usize,
    /// Element capacity for fixed/var arrays and strings.
    #[serde(default)]
    pub array_length: usize,
    /// Dictionary reference, present iff `storage == Enum`.
    #[serde(rename = "enum", default)]
    pub enum_ref: Option<EnumRef>,
    /// For `ClassArray`: how many following descriptors form one element.
    #[serde(default)]
    pub child_count: usize,
}

impl FieldDescriptor {
    /// Last segment of the dotted element name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Definition of one message: identity plus ordered field descriptors.
#[derive(Debug, Deserialize)]
pub struct MessageDef {
    /// Canonical message name, without format or antenna suffixes.
    pub name: String,
    /// Message id as carried in binary headers.
    #[serde(rename = "id")]
    pub message_id: u16,
    /// Message-definition CRC used to validate wire/header agreement.
    #[serde(default)]
    pub def_crc: u32,
    /// Wire-ordered field descriptors.
    pub fields: Vec<FieldDescriptor>,
}

/// The loaded database. Immutable after load; share by reference.
#[derive(Debug, Deserialize)]
pub struct MessageDatabase {
    #[serde(default)]
    enums: Vec<EnumDict>,
    messages: Vec<MessageDef>,
    #[serde(skip)]
    by_id: HashMap<u16, usize>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
    #[serde(skip)]
    enums_by_name: HashMap<String, usize>,
}

impl MessageDatabase {
    /// Parse a database from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut db: MessageDatabase = serde_json::from_str(json)?;
        db.index();
        Ok(db)
    }

    /// Load a database from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn index(&mut self) {
        for e in &mut self.enums {
            e.index();
        }
        for (i, e) in self.enums.iter().enumerate() {
            self.enums_by_name.insert(e.name.clone(), i);
        }
        for (i, m) in self.messages.iter().enumerate() {
            self.by_id.insert(m.message_id, i);
            self.by_name.insert(m.name.to_ascii_lowercase(), i);
        }
    }

    /// Look up a definition by binary message id.
    #[must_use]
    pub fn definition_by_id(&self, id: u16) -> Option<&MessageDef> {
        self.by_id.get(&id).map(|&i| &self.messages[i])
    }

    /// Look up a definition by canonical name, case-insensitive.
    #[must_use]
    pub fn definition_by_name(&self, name: &str) -> Option<&MessageDef> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.messages[i])
    }

    /// Resolve an enum dictionary reference.
    #[must_use]
    pub fn enum_by_ref(&self, r: &EnumRef) -> Option<&EnumDict> {
        self.enums_by_name.get(&r.0).map(|&i| &self.enums[i])
    }

    /// All message definitions, in database order.
    #[must_use]
    pub fn definitions(&self) -> &[MessageDef] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageDatabase {
        MessageDatabase::from_json_str(
            r#"{
              "enums": [
                { "name": "SolutionStatus",
                  "values": [
                    { "value": 0, "name": "SOL_COMPUTED" },
                    { "value": 1, "name": "INSUFFICIENT_OBS" }
                  ] }
              ],
              "messages": [
                { "name": "TESTPOS", "id": 42, "def_crc": 51978,
                  "fields": [
                    { "name": "TESTPOS.eMySolutionStatus",
                      "type": "SolutionStatus", "base_type": "U32",
                      "storage": "ENUM", "size": 4,
                      "enum": "SolutionStatus" },
                    { "name": "TESTPOS.dMyLatitude", "type": "DOUBLE",
                      "base_type": "F64", "storage": "SIMPLE", "size": 8 }
                  ] }
              ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lookups() {
        let db = sample();
        let def = db.definition_by_id(42).unwrap();
        assert_eq!(def.name, "TESTPOS");
        assert_eq!(def.fields.len(), 2);
        assert!(db.definition_by_id(43).is_none());

        // Name lookup is case-insensitive.
        assert!(db.definition_by_name("testpos").is_some());
        assert!(db.definition_by_name("TESTPOS").is_some());
        assert!(db.definition_by_name("NOPE").is_none());
    }

    #[test]
    fn enum_dict() {
        let db = sample();
        let def = db.definition_by_id(42).unwrap();
        let r = def.fields[0].enum_ref.as_ref().unwrap();
        let dict = db.enum_by_ref(r).unwrap();
        assert_eq!(dict.name_of(0), Some("SOL_COMPUTED"));
        assert_eq!(dict.value_of("INSUFFICIENT_OBS"), Some(1));
        assert_eq!(dict.name_of(9), None);
        assert_eq!(dict.value_of("SOL_BOGUS"), None);
    }

    #[test]
    fn descriptor_fields() {
        let db = sample();
        let def = db.definition_by_name("TESTPOS").unwrap();
        let f = &def.fields[1];
        assert_eq!(f.short_name(), "dMyLatitude");
        assert_eq!(f.base_type, BaseType::F64);
        assert_eq!(f.storage, Storage::Simple);
        assert_eq!(f.element_size, 8);
    }
}
