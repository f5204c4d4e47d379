//! Tagged handles over native engine objects.
//!
//! Scripts never hold raw engine pointers. A [`Handle`] is a {kind tag,
//! scope, slot, generation} tuple; the native object lives in a [`HandleTable`] owned
//! by the bridge. Unboxing checks the kind tag against the expectation
//! before any slot access, so a handle of the wrong kind is a
//! [`ScriptError::TypeMismatch`] rather than a misinterpreted object, and a
//! handle whose table has been cleared is a [`ScriptError::StaleHandle`]
//! rather than stale data.
//!
//! Per-call handles (buffers, tree positions, packet metadata) live in a
//! table dropped when dispatch returns; process handles (protocols, fields,
//! dissectors) live in the interpreter core for the process lifetime.

use std::cell::Cell;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

use wirescript_engine::{
    Address, DissectorHandle, ExpertId, ExpertModuleId, FieldId, ItemRef, PrefModuleId, ProtoId,
    SharedPinfo, SubtreeId, TreeRef, Tvbuff, ValueStrings,
};

use crate::cursor::SharedCursor;
use crate::error::ScriptError;

/// What a handle refers to. The tag is carried inside the script value and
/// validated on every unboxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Buffer,
    Tree,
    Item,
    PacketInfo,
    Columns,
    Cursor,
    Address,
    Ipv4,
    Ipv6,
    Protocol,
    Field,
    Subtree,
    Dissector,
    ValueStrings,
    ExpertModule,
    ExpertInfo,
    PrefModule,
    Preference,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Buffer => "Buffer",
            HandleKind::Tree => "Tree",
            HandleKind::Item => "Item",
            HandleKind::PacketInfo => "PacketInfo",
            HandleKind::Columns => "Columns",
            HandleKind::Cursor => "Cursor",
            HandleKind::Address => "Address",
            HandleKind::Ipv4 => "IPv4",
            HandleKind::Ipv6 => "IPv6",
            HandleKind::Protocol => "Protocol",
            HandleKind::Field => "Field",
            HandleKind::Subtree => "Subtree",
            HandleKind::Dissector => "Dissector",
            HandleKind::ValueStrings => "ValueStrings",
            HandleKind::ExpertModule => "ExpertModule",
            HandleKind::ExpertInfo => "ExpertInfo",
            HandleKind::PrefModule => "PrefModule",
            HandleKind::Preference => "Preference",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which table a handle's slot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleScope {
    /// Valid only within the current dispatch.
    PerCall,
    /// Valid for the process lifetime.
    Process,
}

/// Who frees the underlying object. Engine-owned objects are borrowed by
/// the bridge and must never be dropped from script side; bridge-allocated
/// objects are freed when their last handle goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    Engine,
    Bridge,
}

/// The boxed reference a script value carries. The generation stamp ties
/// the handle to one incarnation of its table: after the table is cleared
/// the stamp no longer matches, so a stashed handle can never alias a slot
/// reused by a later dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: HandleKind,
    pub scope: HandleScope,
    pub ownership: Ownership,
    pub slot: u32,
    pub generation: u32,
}

/// The native object behind a handle. Cloning is cheap: every variant is
/// an id, an `Rc`, or a sliced buffer.
#[derive(Debug, Clone)]
pub enum NativeObj {
    Buffer(Tvbuff),
    Tree(TreeRef),
    Item(ItemRef),
    PacketInfo(SharedPinfo),
    Columns(SharedPinfo),
    Cursor(SharedCursor),
    Address(Address),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Protocol(ProtoId),
    Field(FieldId),
    Subtree(SubtreeId),
    Dissector(DissectorHandle),
    Vals(Rc<ValueStrings>),
    ExpertModule(ExpertModuleId),
    Expert(ExpertId),
    PrefModule(PrefModuleId),
    Preference(Rc<Cell<bool>>),
}

impl NativeObj {
    pub fn kind(&self) -> HandleKind {
        match self {
            NativeObj::Buffer(_) => HandleKind::Buffer,
            NativeObj::Tree(_) => HandleKind::Tree,
            NativeObj::Item(_) => HandleKind::Item,
            NativeObj::PacketInfo(_) => HandleKind::PacketInfo,
            NativeObj::Columns(_) => HandleKind::Columns,
            NativeObj::Cursor(_) => HandleKind::Cursor,
            NativeObj::Address(_) => HandleKind::Address,
            NativeObj::Ipv4(_) => HandleKind::Ipv4,
            NativeObj::Ipv6(_) => HandleKind::Ipv6,
            NativeObj::Protocol(_) => HandleKind::Protocol,
            NativeObj::Field(_) => HandleKind::Field,
            NativeObj::Subtree(_) => HandleKind::Subtree,
            NativeObj::Dissector(_) => HandleKind::Dissector,
            NativeObj::Vals(_) => HandleKind::ValueStrings,
            NativeObj::ExpertModule(_) => HandleKind::ExpertModule,
            NativeObj::Expert(_) => HandleKind::ExpertInfo,
            NativeObj::PrefModule(_) => HandleKind::PrefModule,
            NativeObj::Preference(_) => HandleKind::Preference,
        }
    }

    /// Whether the boxed object is engine-owned (borrowed) or
    /// bridge-allocated. Static value tables are the engine-owned case
    /// that must not be freed from script side.
    pub fn ownership(&self) -> Ownership {
        match self {
            NativeObj::Vals(vals) if !vals.is_owned() => Ownership::Engine,
            NativeObj::Buffer(_)
            | NativeObj::Tree(_)
            | NativeObj::Item(_)
            | NativeObj::PacketInfo(_)
            | NativeObj::Columns(_) => Ownership::Engine,
            _ => Ownership::Bridge,
        }
    }
}

fn next_generation() -> u32 {
    thread_local! {
        static NEXT: Cell<u32> = const { Cell::new(0) };
    }
    NEXT.with(|next| {
        let generation = next.get();
        next.set(generation.wrapping_add(1));
        generation
    })
}

/// One slot table: per-call or process scoped.
pub struct HandleTable {
    scope: HandleScope,
    generation: u32,
    slots: Vec<Option<NativeObj>>,
}

impl HandleTable {
    pub fn new(scope: HandleScope) -> Self {
        HandleTable {
            scope,
            generation: next_generation(),
            slots: Vec::new(),
        }
    }

    /// Boxes a native object, returning the tagged handle to embed in a
    /// script value.
    pub fn insert(&mut self, obj: NativeObj) -> Handle {
        let handle = Handle {
            kind: obj.kind(),
            scope: self.scope,
            ownership: obj.ownership(),
            slot: self.slots.len() as u32,
            generation: self.generation,
        };
        self.slots.push(Some(obj));
        handle
    }

    /// Unboxes a handle. The kind tag is checked before the slot is ever
    /// read; a cleared or out-of-range slot is reported as stale.
    pub fn get(&self, handle: Handle, expected: HandleKind, arg: usize) -> Result<NativeObj, ScriptError> {
        if handle.kind != expected {
            return Err(ScriptError::TypeMismatch {
                index: arg,
                expected,
                found: handle.kind,
            });
        }
        if handle.generation != self.generation {
            return Err(ScriptError::StaleHandle {
                kind: handle.kind,
                slot: handle.slot,
            });
        }
        match self.slots.get(handle.slot as usize) {
            Some(Some(obj)) => Ok(obj.clone()),
            _ => Err(ScriptError::StaleHandle {
                kind: handle.kind,
                slot: handle.slot,
            }),
        }
    }

    /// Drops every boxed object and advances the generation. Outstanding
    /// handles into this table become stale, not dangling, and can never
    /// alias a slot minted later.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.generation = next_generation();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn tag_checked_before_slot_access() {
        let mut table = HandleTable::new(HandleScope::PerCall);
        let h = table.insert(NativeObj::Buffer(Tvbuff::new(Bytes::from_static(&[1]))));
        assert_eq!(h.kind, HandleKind::Buffer);
        assert_eq!(h.ownership, Ownership::Engine);
        let err = table.get(h, HandleKind::Cursor, 2).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::TypeMismatch {
                index: 2,
                expected: HandleKind::Cursor,
                found: HandleKind::Buffer,
            }
        ));
    }

    #[test]
    fn cleared_table_reports_stale() {
        let mut table = HandleTable::new(HandleScope::PerCall);
        let h = table.insert(NativeObj::Protocol(ProtoId(3)));
        table.clear();
        let err = table.get(h, HandleKind::Protocol, 1).unwrap_err();
        assert!(matches!(err, ScriptError::StaleHandle { slot: 0, .. }));
    }

    #[test]
    fn static_vals_are_engine_owned() {
        let statics = NativeObj::Vals(Rc::new(ValueStrings::Static(wirescript_engine::CKSUM_VALS)));
        assert_eq!(statics.ownership(), Ownership::Engine);
        let owned = NativeObj::Vals(Rc::new(ValueStrings::from_pairs([(1u64, "x")])));
        assert_eq!(owned.ownership(), Ownership::Bridge);
    }
}
