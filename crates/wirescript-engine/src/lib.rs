//! In-process model of the packet-analysis engine consumed by the
//! `wirescript` bridge.
//!
//! This crate provides the native side of the bridge: bounds-checked packet
//! buffers ([`Tvbuff`]), the protocol tree ([`ProtoTree`] and its
//! [`TreeRef`]/[`ItemRef`] views), header-field and subtree registries
//! ([`FieldRegistry`]), dissector tables ([`DissectorTables`]), per-packet
//! metadata ([`PacketInfo`]), addresses, expert-info and preference
//! registries, and the Internet checksum.
//!
//! Everything here is single-threaded by design. Shared structures use
//! `Rc`/`RefCell`; registration happens before any packet is dissected, so
//! the registries are plain maps without locking.

pub mod addr;
pub mod cksum;
pub mod dissect;
pub mod expert;
pub mod fault;
pub mod fields;
pub mod packet;
pub mod prefs;
pub mod tree;
pub mod tvb;
pub mod vals;

pub use addr::{Address, AddressType};
pub use dissect::{DissectorFn, DissectorHandle, DissectorTables};
pub use expert::{ExpertGroup, ExpertId, ExpertInfo, ExpertModuleId, ExpertRegistry, ExpertSeverity};
pub use fault::Fault;
pub use fields::{
    Encoding, FieldDisplay, FieldId, FieldInfo, FieldRegistry, FieldType, ProtoId, ProtocolInfo,
    SubtreeId,
};
pub use packet::{ColumnId, ColumnInfo, PacketInfo, SharedPinfo};
pub use prefs::{PrefModuleId, PrefRegistry, Preference};
pub use tree::{ChecksumFlags, ChecksumStatus, ItemRef, ProtoTree, TreeRef, TypedValue};
pub use tvb::Tvbuff;
pub use vals::{CKSUM_VALS, ValueStrings};
