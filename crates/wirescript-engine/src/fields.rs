//! Header-field, protocol, and subtree registries.
//!
//! Registration is process-lifetime and strictly precedes dissection. Every
//! `register_*` call mints a fresh id; registering the same protocol name
//! twice yields two distinct protocols, by contract.

use std::rc::Rc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::vals::ValueStrings;

// ============================================================================
// Ids
// ============================================================================

/// Identifies a registered protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoId(pub u32);

/// Identifies a registered header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

/// Identifies a registered subtree (expansion state slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubtreeId(pub u32);

// ============================================================================
// Field descriptions
// ============================================================================

/// Wire type of a header field. Values cross the script boundary as
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum FieldType {
    None = 0,
    Protocol = 1,
    Boolean = 2,
    Uint8 = 3,
    Uint16 = 4,
    Uint24 = 5,
    Uint32 = 6,
    Uint64 = 7,
    Int8 = 8,
    Int16 = 9,
    Int32 = 10,
    Int64 = 11,
    String = 12,
    Bytes = 13,
    Ipv4 = 14,
    Ipv6 = 15,
}

impl FieldType {
    pub fn is_uint(self) -> bool {
        matches!(
            self,
            FieldType::Uint8 | FieldType::Uint16 | FieldType::Uint24 | FieldType::Uint32 | FieldType::Uint64
        )
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }

    /// Fixed wire size in bytes, where the type has one.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Boolean | FieldType::Uint8 | FieldType::Int8 => Some(1),
            FieldType::Uint16 | FieldType::Int16 => Some(2),
            FieldType::Uint24 => Some(3),
            FieldType::Uint32 | FieldType::Int32 | FieldType::Ipv4 => Some(4),
            FieldType::Uint64 | FieldType::Int64 => Some(8),
            FieldType::Ipv6 => Some(16),
            _ => None,
        }
    }
}

/// Display base for numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum FieldDisplay {
    None = 0,
    Dec = 1,
    Hex = 2,
    Oct = 3,
}

/// Byte-order / representation selector passed to tree-add operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Encoding {
    BigEndian = 0,
    LittleEndian = 1,
    /// Not applicable (single bytes, strings).
    Na = 2,
}

impl Encoding {
    pub fn is_little_endian(self) -> bool {
        matches!(self, Encoding::LittleEndian)
    }
}

/// Everything the engine needs to know about one header field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Human-readable name ("Transfer length").
    pub name: String,
    /// Filter abbreviation ("demo.len").
    pub abbrev: String,
    pub ftype: FieldType,
    pub display: FieldDisplay,
    /// Optional value-to-label table shared with the registering script.
    pub strings: Option<Rc<ValueStrings>>,
    pub bitmask: u64,
    /// Optional longer description.
    pub blurb: Option<String>,
}

/// Name and filter identity of a registered protocol.
#[derive(Debug, Clone)]
pub struct ProtocolInfo {
    pub name: String,
    pub short_name: String,
    pub filter_name: String,
}

// ============================================================================
// Registry
// ============================================================================

/// Process-lifetime registry of protocols, header fields, and subtrees.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    protocols: Vec<ProtocolInfo>,
    fields: Vec<(ProtoId, FieldInfo)>,
    subtree_count: u32,
}

impl FieldRegistry {
    pub fn new() -> Self {
        FieldRegistry::default()
    }

    /// Registers a protocol. Never idempotent: every call mints a new id.
    pub fn register_protocol(&mut self, name: &str, short_name: &str, filter_name: &str) -> ProtoId {
        let id = ProtoId(self.protocols.len() as u32);
        self.protocols.push(ProtocolInfo {
            name: name.to_owned(),
            short_name: short_name.to_owned(),
            filter_name: filter_name.to_owned(),
        });
        log::debug!("registered protocol {} as {:?}", filter_name, id);
        id
    }

    pub fn register_field(&mut self, proto: ProtoId, info: FieldInfo) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push((proto, info));
        id
    }

    /// Mints a subtree id. Subtrees carry no payload beyond their slot.
    pub fn register_subtree(&mut self) -> SubtreeId {
        let id = SubtreeId(self.subtree_count);
        self.subtree_count += 1;
        id
    }

    pub fn protocol(&self, id: ProtoId) -> Option<&ProtocolInfo> {
        self.protocols.get(id.0 as usize)
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldInfo> {
        self.fields.get(id.0 as usize).map(|(_, info)| info)
    }

    pub fn field_protocol(&self, id: FieldId) -> Option<ProtoId> {
        self.fields.get(id.0 as usize).map(|(proto, _)| *proto)
    }

    pub fn protocol_count(&self) -> usize {
        self.protocols.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn subtree_count(&self) -> usize {
        self.subtree_count as usize
    }

    pub fn clear(&mut self) {
        self.protocols.clear();
        self.fields.clear();
        self.subtree_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> FieldInfo {
        FieldInfo {
            name: name.to_owned(),
            abbrev: format!("t.{name}"),
            ftype: FieldType::Uint16,
            display: FieldDisplay::Dec,
            strings: None,
            bitmask: 0,
            blurb: None,
        }
    }

    #[test]
    fn protocol_registration_is_never_idempotent() {
        let mut reg = FieldRegistry::new();
        let a = reg.register_protocol("Demo", "DEMO", "demo");
        let b = reg.register_protocol("Demo", "DEMO", "demo");
        assert_ne!(a, b);
        assert_eq!(reg.protocol_count(), 2);
    }

    #[test]
    fn fields_and_subtrees_mint_sequential_ids() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Demo", "DEMO", "demo");
        let f0 = reg.register_field(proto, field("a"));
        let f1 = reg.register_field(proto, field("b"));
        assert_ne!(f0, f1);
        assert_eq!(reg.field(f1).map(|i| i.name.as_str()), Some("b"));
        assert_eq!(reg.field_protocol(f0), Some(proto));
        let s0 = reg.register_subtree();
        let s1 = reg.register_subtree();
        assert_ne!(s0, s1);
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(FieldType::Uint16.fixed_size(), Some(2));
        assert_eq!(FieldType::Ipv6.fixed_size(), Some(16));
        assert_eq!(FieldType::String.fixed_size(), None);
        assert!(FieldType::Uint24.is_uint());
        assert!(!FieldType::Int8.is_uint());
    }
}
