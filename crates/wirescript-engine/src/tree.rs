//! The protocol tree.
//!
//! Dissectors describe a packet by adding items to a tree of nodes, each
//! node covering a byte range of the buffer it was read from. The tree is
//! an arena owned by an `Rc<RefCell<...>>`; [`TreeRef`] and [`ItemRef`] are
//! cheap clonable views addressing one node each. A `TreeRef` is a place to
//! add children; an `ItemRef` is a produced item that can grow a subtree,
//! extra text, flags, or expert annotations.
//!
//! Borrows of the arena are taken per operation and never held across calls
//! into foreign code, so nested dissection (a dissector handing a
//! sub-buffer to another dissector) works on the same tree.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::addr::Address;
use crate::fault::Fault;
use crate::fields::{Encoding, FieldId, FieldInfo, FieldType, ProtoId, SubtreeId};
use crate::tvb::Tvbuff;

// ============================================================================
// Values extracted while adding items
// ============================================================================

/// The typed value read from the buffer by a `*_ret_*` tree addition.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Str(String),
    Addr(Address),
}

/// Verification outcome recorded by [`TreeRef::add_checksum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ChecksumStatus {
    Bad = 0,
    Good = 1,
    Unverified = 2,
    NotPresent = 3,
}

bitflags! {
    /// Behavior flags for [`TreeRef::add_checksum`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChecksumFlags: u32 {
        /// Compare the wire value against the computed one.
        const VERIFY = 0x01;
        /// A zero wire checksum means "not computed by the sender".
        const ZERO = 0x02;
        /// The checksum field is absent from this packet.
        const NOT_PRESENT = 0x04;
    }
}

// ============================================================================
// Arena
// ============================================================================

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Field(FieldId),
    Protocol(ProtoId),
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    start: usize,
    len: usize,
    appended: String,
    hidden: bool,
    generated: bool,
    subtree: Option<SubtreeId>,
    experts: Vec<(crate::expert::ExpertId, Option<String>)>,
    children: Vec<usize>,
}

impl Node {
    fn new(kind: NodeKind, start: usize, len: usize) -> Self {
        Node {
            kind,
            start,
            len,
            appended: String::new(),
            hidden: false,
            generated: false,
            subtree: None,
            experts: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Arena of tree nodes for one dissection pass.
#[derive(Debug)]
pub struct ProtoTree {
    nodes: Vec<Node>,
}

impl ProtoTree {
    /// Creates an empty tree and returns a reference to its root.
    pub fn new() -> TreeRef {
        let arena = Rc::new(RefCell::new(ProtoTree {
            nodes: vec![Node::new(NodeKind::Root, 0, 0)],
        }));
        TreeRef { arena, node: 0 }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

type SharedTree = Rc<RefCell<ProtoTree>>;

fn push_child(arena: &SharedTree, parent: usize, node: Node) -> usize {
    let mut tree = arena.borrow_mut();
    let idx = tree.nodes.len();
    tree.nodes.push(node);
    tree.nodes[parent].children.push(idx);
    idx
}

/// Resolves a script-side length (`-1` = to the end of captured data) to a
/// concrete byte count, bounds-checking the full range.
fn resolve_len(tvb: &Tvbuff, start: usize, len: i64) -> Result<usize, Fault> {
    let len = if len < 0 {
        tvb.captured_length_remaining(start)
    } else {
        len as usize
    };
    // Validate the whole range up front so the node never covers bytes
    // that were not captured.
    tvb.get_bytes(start, Some(len))?;
    Ok(len)
}

/// Numeric extraction reads 1..=8 bytes; any other length is a fault,
/// never a truncated or wrongly-extended value.
fn numeric_len(ftype: FieldType, len: usize) -> Result<usize, Fault> {
    if (1..=8).contains(&len) {
        Ok(len)
    } else {
        Err(Fault::dissector(format!(
            "invalid length {len} for field type {ftype:?}"
        )))
    }
}

// ============================================================================
// TreeRef: adding items
// ============================================================================

/// A position in the tree under which new items are added.
#[derive(Debug, Clone)]
pub struct TreeRef {
    arena: SharedTree,
    node: usize,
}

impl TreeRef {
    /// Adds an item for `field` covering `len` bytes at `start` (`-1` =
    /// remaining captured bytes).
    pub fn add_item(
        &self,
        field: FieldId,
        tvb: &Tvbuff,
        start: usize,
        len: i64,
        _enc: Encoding,
    ) -> Result<ItemRef, Fault> {
        let len = resolve_len(tvb, start, len)?;
        let idx = push_child(&self.arena, self.node, Node::new(NodeKind::Field(field), start, len));
        Ok(ItemRef {
            arena: Rc::clone(&self.arena),
            node: idx,
        })
    }

    /// Adds an item and returns the typed value read from the buffer,
    /// according to the field's wire type.
    pub fn add_item_ret(
        &self,
        field: FieldId,
        info: &FieldInfo,
        tvb: &Tvbuff,
        start: usize,
        len: i64,
        enc: Encoding,
    ) -> Result<(ItemRef, TypedValue), Fault> {
        let len = resolve_len(tvb, start, len)?;
        let le = enc.is_little_endian();
        let value = match info.ftype {
            FieldType::Boolean => {
                let len = numeric_len(info.ftype, len.max(1))?;
                TypedValue::Bool(tvb.get_uint(start, len, le)? != 0)
            }
            ft if ft.is_uint() => {
                TypedValue::Uint(tvb.get_uint(start, numeric_len(ft, len)?, le)?)
            }
            ft if ft.is_int() => {
                let len = numeric_len(ft, len)?;
                let raw = tvb.get_uint(start, len, le)?;
                let shift = 64 - (len * 8) as u32;
                TypedValue::Int(((raw << shift) as i64) >> shift)
            }
            FieldType::String => {
                let raw = tvb.get_bytes(start, Some(len))?;
                TypedValue::Str(String::from_utf8_lossy(&raw).into_owned())
            }
            FieldType::Ipv4 => TypedValue::Addr(Address::Ipv4(tvb.get_ipv4(start)?)),
            FieldType::Ipv6 => TypedValue::Addr(Address::Ipv6(tvb.get_ipv6(start)?)),
            other => {
                return Err(Fault::dissector(format!(
                    "cannot return a value for field type {other:?}"
                )));
            }
        };
        let idx = push_child(&self.arena, self.node, Node::new(NodeKind::Field(field), start, len));
        Ok((
            ItemRef {
                arena: Rc::clone(&self.arena),
                node: idx,
            },
            value,
        ))
    }

    /// Adds the top-level item for a protocol's claim on a byte range.
    pub fn add_protocol(
        &self,
        proto: ProtoId,
        tvb: &Tvbuff,
        start: usize,
        len: i64,
    ) -> Result<ItemRef, Fault> {
        let len = resolve_len(tvb, start, len)?;
        let idx = push_child(
            &self.arena,
            self.node,
            Node::new(NodeKind::Protocol(proto), start, len),
        );
        Ok(ItemRef {
            arena: Rc::clone(&self.arena),
            node: idx,
        })
    }

    /// Adds a free-text item (used by the fallback data dissector).
    pub fn add_text(&self, text: impl Into<String>, start: usize, len: usize) -> ItemRef {
        let idx = push_child(
            &self.arena,
            self.node,
            Node::new(NodeKind::Text(text.into()), start, len),
        );
        ItemRef {
            arena: Rc::clone(&self.arena),
            node: idx,
        }
    }

    /// Adds a two-byte checksum item at `start`, verifying it against
    /// `computed` when requested. Returns the item and the recorded status.
    /// When a status field is given, a generated status item is added next
    /// to the checksum; on a bad checksum the optional `expert` entry is
    /// attached.
    #[allow(clippy::too_many_arguments)]
    pub fn add_checksum(
        &self,
        tvb: &Tvbuff,
        start: usize,
        field: FieldId,
        status_field: Option<FieldId>,
        computed: u16,
        expert: Option<crate::expert::ExpertId>,
        enc: Encoding,
        flags: ChecksumFlags,
    ) -> Result<(ItemRef, ChecksumStatus), Fault> {
        if flags.contains(ChecksumFlags::NOT_PRESENT) {
            let item = self.add_text("Checksum: [missing]", start, 0);
            item.set_generated();
            return Ok((item, ChecksumStatus::NotPresent));
        }
        let wire = if enc.is_little_endian() {
            tvb.get_uint(start, 2, true)? as u16
        } else {
            tvb.get_ntohs(start)?
        };
        let item = self.add_item(field, tvb, start, 2, enc)?;
        let status = if !flags.contains(ChecksumFlags::VERIFY) {
            ChecksumStatus::Unverified
        } else if wire == 0 && flags.contains(ChecksumFlags::ZERO) {
            ChecksumStatus::NotPresent
        } else if wire == computed {
            ChecksumStatus::Good
        } else {
            item.append_text(format!(" [should be 0x{computed:04x}]"));
            if let Some(expert) = expert {
                item.add_expert(expert, None);
            }
            ChecksumStatus::Bad
        };
        if let Some(status_field) = status_field {
            let status_item = self.add_item(status_field, tvb, start, 2, enc)?;
            status_item.set_generated();
        }
        Ok((item, status))
    }

    pub fn child_count(&self) -> usize {
        self.arena.borrow().nodes[self.node].children.len()
    }
}

// ============================================================================
// ItemRef: decorating produced items
// ============================================================================

/// A produced tree item.
#[derive(Debug, Clone)]
pub struct ItemRef {
    arena: SharedTree,
    node: usize,
}

impl ItemRef {
    /// Attaches a subtree slot to this item and returns a [`TreeRef`] for
    /// adding children under it.
    pub fn add_subtree(&self, ett: SubtreeId) -> TreeRef {
        self.arena.borrow_mut().nodes[self.node].subtree = Some(ett);
        TreeRef {
            arena: Rc::clone(&self.arena),
            node: self.node,
        }
    }

    pub fn append_text(&self, text: impl AsRef<str>) {
        self.arena.borrow_mut().nodes[self.node]
            .appended
            .push_str(text.as_ref());
    }

    pub fn set_hidden(&self) {
        self.arena.borrow_mut().nodes[self.node].hidden = true;
    }

    pub fn set_generated(&self) {
        self.arena.borrow_mut().nodes[self.node].generated = true;
    }

    /// Attaches an expert-info entry, optionally replacing its summary.
    pub fn add_expert(&self, expert: crate::expert::ExpertId, message: Option<String>) {
        self.arena.borrow_mut().nodes[self.node]
            .experts
            .push((expert, message));
    }

    // Read accessors, mainly for the host and for tests.

    pub fn byte_range(&self) -> (usize, usize) {
        let tree = self.arena.borrow();
        let node = &tree.nodes[self.node];
        (node.start, node.len)
    }

    pub fn field(&self) -> Option<FieldId> {
        match self.arena.borrow().nodes[self.node].kind {
            NodeKind::Field(id) => Some(id),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Option<ProtoId> {
        match self.arena.borrow().nodes[self.node].kind {
            NodeKind::Protocol(id) => Some(id),
            _ => None,
        }
    }

    pub fn appended_text(&self) -> String {
        self.arena.borrow().nodes[self.node].appended.clone()
    }

    pub fn is_hidden(&self) -> bool {
        self.arena.borrow().nodes[self.node].hidden
    }

    pub fn is_generated(&self) -> bool {
        self.arena.borrow().nodes[self.node].generated
    }

    pub fn expert_count(&self) -> usize {
        self.arena.borrow().nodes[self.node].experts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::fields::{FieldDisplay, FieldRegistry};

    fn uint16_field(reg: &mut FieldRegistry, proto: ProtoId) -> (FieldId, FieldInfo) {
        let info = FieldInfo {
            name: "Length".into(),
            abbrev: "t.len".into(),
            ftype: FieldType::Uint16,
            display: FieldDisplay::Dec,
            strings: None,
            bitmask: 0,
            blurb: None,
        };
        (reg.register_field(proto, info.clone()), info)
    }

    #[test]
    fn add_item_ret_reads_typed_value() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let (fid, info) = uint16_field(&mut reg, proto);
        let tvb = Tvbuff::new(Bytes::from_static(&[0x00, 0x09, 0x00, 0x01]));
        let root = ProtoTree::new();
        let (item, value) = root
            .add_item_ret(fid, &info, &tvb, 0, 2, Encoding::BigEndian)
            .unwrap();
        assert_eq!(value, TypedValue::Uint(9));
        assert_eq!(item.byte_range(), (0, 2));
        assert_eq!(item.field(), Some(fid));
    }

    #[test]
    fn numeric_len_outside_one_to_eight_is_a_fault() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let (fid, info) = uint16_field(&mut reg, proto);
        // Long enough that the range itself is in bounds; the length is
        // still unusable for a numeric read.
        let tvb = Tvbuff::new(Bytes::from_static(&[0; 12]));
        let root = ProtoTree::new();
        assert!(matches!(
            root.add_item_ret(fid, &info, &tvb, 0, 9, Encoding::BigEndian),
            Err(Fault::Dissector(_))
        ));
        assert!(matches!(
            root.add_item_ret(fid, &info, &tvb, 0, 0, Encoding::BigEndian),
            Err(Fault::Dissector(_))
        ));
    }

    #[test]
    fn signed_len_outside_one_to_eight_is_a_fault() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let info = FieldInfo {
            name: "Delta".into(),
            abbrev: "t.delta".into(),
            ftype: FieldType::Int32,
            display: FieldDisplay::Dec,
            strings: None,
            bitmask: 0,
            blurb: None,
        };
        let fid = reg.register_field(proto, info.clone());
        let tvb = Tvbuff::new(Bytes::from_static(&[0; 12]));
        let root = ProtoTree::new();
        assert!(matches!(
            root.add_item_ret(fid, &info, &tvb, 0, 9, Encoding::BigEndian),
            Err(Fault::Dissector(_))
        ));
    }

    #[test]
    fn out_of_range_item_is_a_fault() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let (fid, _) = uint16_field(&mut reg, proto);
        let tvb = Tvbuff::new(Bytes::from_static(&[0x01]));
        let root = ProtoTree::new();
        assert!(matches!(
            root.add_item(fid, &tvb, 0, 2, Encoding::BigEndian),
            Err(Fault::Bounds { .. })
        ));
    }

    #[test]
    fn negative_len_covers_remaining() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let (fid, _) = uint16_field(&mut reg, proto);
        let tvb = Tvbuff::new(Bytes::from_static(&[1, 2, 3, 4]));
        let root = ProtoTree::new();
        let item = root.add_item(fid, &tvb, 1, -1, Encoding::BigEndian).unwrap();
        assert_eq!(item.byte_range(), (1, 3));
    }

    #[test]
    fn subtree_nests_children() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let ett = reg.register_subtree();
        let tvb = Tvbuff::new(Bytes::from_static(&[0, 0]));
        let root = ProtoTree::new();
        let proto_item = root.add_protocol(proto, &tvb, 0, -1).unwrap();
        let sub = proto_item.add_subtree(ett);
        sub.add_text("inner", 0, 1);
        assert_eq!(sub.child_count(), 1);
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn checksum_verification() {
        let mut reg = FieldRegistry::new();
        let proto = reg.register_protocol("Test", "TEST", "test");
        let (fid, _) = uint16_field(&mut reg, proto);
        let tvb = Tvbuff::new(Bytes::from_static(&[0x12, 0x34]));
        let root = ProtoTree::new();

        let (_, good) = root
            .add_checksum(&tvb, 0, fid, None, 0x1234, None, Encoding::BigEndian, ChecksumFlags::VERIFY)
            .unwrap();
        assert_eq!(good, ChecksumStatus::Good);

        let (item, bad) = root
            .add_checksum(&tvb, 0, fid, None, 0xffff, None, Encoding::BigEndian, ChecksumFlags::VERIFY)
            .unwrap();
        assert_eq!(bad, ChecksumStatus::Bad);
        assert!(item.appended_text().contains("0xffff"));

        let (_, unchecked) = root
            .add_checksum(&tvb, 0, fid, None, 0xffff, None, Encoding::BigEndian, ChecksumFlags::empty())
            .unwrap();
        assert_eq!(unchecked, ChecksumStatus::Unverified);
    }
}
