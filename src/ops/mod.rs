//! Script-facing operations, grouped the way the script modules expose
//! them. Every operation is a method on [`crate::ctx::ScriptCtx`] taking
//! the raw argument slice and returning the result values.

pub mod addr;
pub mod expert;
pub mod pinfo;
pub mod prefs;
pub mod proto;
pub mod tvb;
pub mod util;
pub mod vals;
