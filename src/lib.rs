//! wirescript: a bridge between a sandboxed scripting runtime and a native
//! packet-analysis engine.
//!
//! Scripts written against this bridge register protocols, header fields,
//! and dissectors, and are dispatched per packet by the engine. The bridge
//! guarantees three things the raw boundary does not:
//!
//! - **Memory safety across the boundary.** Scripts hold tagged handles,
//!   never raw engine objects; every unboxing validates the kind tag first
//!   and a handle that outlives its table turns stale instead of dangling
//!   (see [`handle`]).
//! - **Failure containment.** Script callables run protected: an error or
//!   panic inside one aborts the current packet with a traceback, never
//!   the process (see [`ctx`] and [`error`]).
//! - **Idiomatic registration.** Declarative field and expert tables are
//!   bound in place, offset cursors thread through tree additions, and the
//!   standard plugin lifecycle drives it all (see [`ops`], [`cursor`],
//!   [`interp`]).
//!
//! The native side is modeled by the [`wirescript_engine`] crate and
//! re-exported here as [`engine`].

pub mod ctx;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod interp;
pub mod ops;
pub mod value;

pub use wirescript_engine as engine;

pub use ctx::ScriptCtx;
pub use cursor::{Cursor, SharedCursor};
pub use error::{BridgeError, CallFailure, ScriptError, Traceback};
pub use handle::{Handle, HandleKind, HandleScope, HandleTable, NativeObj, Ownership};
pub use interp::{
    ModuleDescription, ModuleLoader, ModuleSet, OutputFn, OutputGuard, ScriptInfo, ScriptModule,
    Wirescript,
};
pub use value::{ListRef, ScriptFn, TableRef, Value};

pub mod prelude {
    pub use crate::ctx::ScriptCtx;
    pub use crate::cursor::Cursor;
    pub use crate::error::{BridgeError, CallFailure, ScriptError};
    pub use crate::handle::{Handle, HandleKind};
    pub use crate::interp::{ModuleLoader, ModuleSet, ScriptInfo, ScriptModule, Wirescript};
    pub use crate::value::{ScriptFn, Value};
    pub use wirescript_engine::{
        Encoding, Fault, FieldDisplay, FieldType, PacketInfo, ProtoTree, Tvbuff,
    };
}
