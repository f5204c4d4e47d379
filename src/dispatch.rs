//! Dissector registration and dispatch.
//!
//! `register_dissector` retains the script callable in the interpreter's
//! callback registry and hands the engine a closure capturing only the
//! interpreter core and the opaque callback id. When the engine dispatches
//! a packet, the closure builds a fresh per-call context, marshals the
//! buffer, packet metadata, tree position, and columns as per-call handles,
//! and runs the callable protected. The per-call table is cleared on exit,
//! so any handle the script stashed turns stale instead of dangling.

use std::cell::RefCell;
use std::rc::Rc;

use wirescript_engine::{DissectorTables, Fault, SharedPinfo, TreeRef, Tvbuff};

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::NativeObj;
use crate::interp::Interp;
use crate::value::Value;

/// Runs one retained dissector callback for one packet: the engine-facing
/// half of dispatch.
fn dispatch(
    core: &Rc<RefCell<Interp>>,
    callback_id: u32,
    tvb: &Tvbuff,
    pinfo: &SharedPinfo,
    tree: &TreeRef,
) -> Result<usize, Fault> {
    let Some((name, func)) = core.borrow().callbacks.get(callback_id) else {
        return Err(Fault::dissector(format!(
            "dissector callback {callback_id} is no longer registered"
        )));
    };
    let mut ctx = ScriptCtx::new(Rc::clone(core));
    let args = vec![
        ctx.box_local(NativeObj::Buffer(tvb.clone())),
        ctx.box_local(NativeObj::PacketInfo(Rc::clone(pinfo))),
        ctx.box_local(NativeObj::Tree(tree.clone())),
        ctx.box_local(NativeObj::Columns(Rc::clone(pinfo))),
    ];
    let result = ctx.invoke(&name, &func, &args);
    // Per-call handles die here; stashed copies become stale.
    ctx.locals.clear();
    match result {
        Ok(values) => {
            let consumed = match values.first() {
                Some(Value::Int(v)) => usize::try_from(*v).unwrap_or(0),
                _ => 0,
            };
            Ok(consumed)
        }
        Err(failure) => Err(failure.into_fault()),
    }
}

impl ScriptCtx {
    /// `register_dissector(proto, name, func) -> DissectorHandle`
    pub fn register_dissector(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let proto = self.check_proto(args, 1)?;
        let name = self.arg_str(args, 2)?;
        let func = self.arg_func(args, 3)?;

        let core = Rc::clone(&self.core);
        let handle = {
            let mut interp = self.core.borrow_mut();
            let callback_id = interp.callbacks.insert(&name, func);
            let engine_core = Rc::clone(&core);
            interp.tables.register_dissector(
                &name,
                proto,
                Rc::new(move |tvb, pinfo, tree| {
                    dispatch(&engine_core, callback_id, tvb, pinfo, tree)
                }),
            )
        };
        Ok(vec![self.box_process(NativeObj::Dissector(handle))])
    }

    /// `find_dissector(name) -> DissectorHandle | nil`
    pub fn find_dissector(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let name = self.arg_str(args, 1)?;
        let handle = self.core.borrow().tables.find_dissector(&name);
        Ok(vec![match handle {
            Some(handle) => self.box_process(NativeObj::Dissector(handle)),
            None => Value::Nil,
        }])
    }

    /// `dissector_add_uint(table, pattern, handle)`
    pub fn dissector_add_uint(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let table = self.arg_str(args, 1)?;
        let pattern = self.arg_int(args, 2)?;
        let handle = self.check_dissector(args, 3)?;
        let pattern = u32::try_from(pattern)
            .map_err(|_| ScriptError::runtime(format!("pattern {pattern} out of range")))?;
        self.core
            .borrow_mut()
            .tables
            .add_uint(&table, pattern, handle);
        Ok(vec![])
    }

    /// `dissector_try_uint(table, pattern, tvb, pinfo, tree) -> consumed`
    ///
    /// No match consumes zero bytes; a fault from the matched dissector
    /// re-raises through the script error path.
    pub fn dissector_try_uint(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let table = self.arg_str(args, 1)?;
        let pattern = self.arg_int(args, 2)?;
        let tvb = self.check_buffer(args, 3)?;
        let pinfo = self.check_pinfo(args, 4)?;
        let tree = self.check_tree(args, 5)?;
        let pattern = u32::try_from(pattern)
            .map_err(|_| ScriptError::runtime(format!("pattern {pattern} out of range")))?;

        // Clone the handle out before calling so the dissector can borrow
        // the core again (nested dissection).
        let handle = self.core.borrow().tables.find_uint(&table, pattern);
        let consumed = match handle {
            Some(handle) => handle.call(&tvb, &pinfo, &tree)?,
            None => 0,
        };
        Ok(vec![Value::Int(consumed as i64)])
    }

    /// `call_data_dissector(tvb, tree) -> consumed`: the undissected-data
    /// fallback.
    pub fn call_data_dissector(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let tree = self.check_tree(args, 2)?;
        let consumed = DissectorTables::call_data_dissector(&tvb, &tree);
        Ok(vec![Value::Int(consumed as i64)])
    }
}
