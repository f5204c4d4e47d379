//! The bridge context handed to every script callable.
//!
//! [`ScriptCtx`] carries the per-call handle table, the live frame stack,
//! and a reference to the interpreter core. All script-facing operations
//! are methods on it (spread across the `ops` modules); the protected-call
//! machinery lives here.
//!
//! Borrow discipline: the interpreter core is a `RefCell`. Operations
//! borrow it for the duration of one registry access and never across an
//! invocation of a script callable, which is what makes nested dissection
//! work.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use bytes::Bytes;

use wirescript_engine::{ItemRef, SharedPinfo, TreeRef, Tvbuff};

use crate::cursor::SharedCursor;
use crate::error::{CallFailure, ScriptError, Traceback};
use crate::handle::{HandleKind, HandleScope, HandleTable, NativeObj};
use crate::interp::Interp;
use crate::value::{ListRef, ScriptFn, TableRef, Value};

const NIL: Value = Value::Nil;

/// Execution context for script operations and callables.
pub struct ScriptCtx {
    pub(crate) core: Rc<RefCell<Interp>>,
    pub(crate) locals: HandleTable,
    frames: Vec<String>,
}

impl ScriptCtx {
    pub(crate) fn new(core: Rc<RefCell<Interp>>) -> Self {
        ScriptCtx {
            core,
            locals: HandleTable::new(HandleScope::PerCall),
            frames: Vec::new(),
        }
    }

    // ========================================================================
    // Protected calls
    // ========================================================================

    /// Runs a script callable under protection. The frame is pushed before
    /// the call so a failure anywhere below captures the full live stack;
    /// panics inside the callable are caught and surfaced as script
    /// errors.
    pub fn invoke(
        &mut self,
        name: &str,
        func: &ScriptFn,
        args: &[Value],
    ) -> Result<Vec<Value>, CallFailure> {
        self.frames.push(name.to_owned());
        let outcome = catch_unwind(AssertUnwindSafe(|| func(self, args)));
        let result = match outcome {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(error)) => Err(CallFailure {
                error,
                traceback: self.traceback(),
            }),
            Err(panic) => Err(CallFailure {
                error: ScriptError::Runtime(panic_message(panic)),
                traceback: self.traceback(),
            }),
        };
        self.frames.pop();
        result
    }

    /// Snapshot of the live frame stack, innermost first.
    fn traceback(&self) -> Traceback {
        Traceback::from_frames(self.frames.iter().rev().cloned().collect())
    }

    /// The innermost live frame, used for call-site capture in `logf`.
    pub fn current_frame(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    /// Writes a line through the interpreter's output sink.
    pub fn print(&mut self, message: &str) {
        let mut core = self.core.borrow_mut();
        (core.output)(message);
    }

    // ========================================================================
    // Boxing
    // ========================================================================

    /// Boxes a per-call object; the handle dies with the current dispatch.
    pub(crate) fn box_local(&mut self, obj: NativeObj) -> Value {
        Value::Handle(self.locals.insert(obj))
    }

    /// Boxes a process-lifetime object in the interpreter core.
    pub(crate) fn box_process(&mut self, obj: NativeObj) -> Value {
        Value::Handle(self.core.borrow_mut().process.insert(obj))
    }

    /// Unboxes a handle argument, routing to the right table by scope.
    /// The kind tag is validated before any slot access.
    pub(crate) fn unbox(
        &self,
        value: &Value,
        arg: usize,
        expected: HandleKind,
    ) -> Result<NativeObj, ScriptError> {
        let Value::Handle(handle) = value else {
            return Err(ScriptError::ArgError {
                index: arg,
                expected: expected.name(),
                found: value.type_name(),
            });
        };
        match handle.scope {
            HandleScope::PerCall => self.locals.get(*handle, expected, arg),
            HandleScope::Process => self.core.borrow().process.get(*handle, expected, arg),
        }
    }

    // ========================================================================
    // Argument access (1-based indices, as the error messages read)
    // ========================================================================

    pub(crate) fn arg<'a>(&self, args: &'a [Value], index: usize) -> &'a Value {
        args.get(index - 1).unwrap_or(&NIL)
    }

    fn arg_error(&self, index: usize, expected: &'static str, found: &Value) -> ScriptError {
        ScriptError::ArgError {
            index,
            expected,
            found: found.type_name(),
        }
    }

    pub(crate) fn arg_int(&self, args: &[Value], index: usize) -> Result<i64, ScriptError> {
        match self.arg(args, index) {
            Value::Int(v) => Ok(*v),
            other => Err(self.arg_error(index, "integer", other)),
        }
    }

    pub(crate) fn opt_int(&self, args: &[Value], index: usize, default: i64) -> Result<i64, ScriptError> {
        match self.arg(args, index) {
            Value::Nil => Ok(default),
            Value::Int(v) => Ok(*v),
            other => Err(self.arg_error(index, "integer", other)),
        }
    }

    pub(crate) fn arg_str(&self, args: &[Value], index: usize) -> Result<Rc<str>, ScriptError> {
        match self.arg(args, index) {
            Value::Str(s) => Ok(Rc::clone(s)),
            other => Err(self.arg_error(index, "string", other)),
        }
    }

    pub(crate) fn opt_str(
        &self,
        args: &[Value],
        index: usize,
        default: &str,
    ) -> Result<Rc<str>, ScriptError> {
        match self.arg(args, index) {
            Value::Nil => Ok(Rc::from(default)),
            Value::Str(s) => Ok(Rc::clone(s)),
            other => Err(self.arg_error(index, "string", other)),
        }
    }

    pub(crate) fn arg_bool(&self, args: &[Value], index: usize) -> Result<bool, ScriptError> {
        match self.arg(args, index) {
            Value::Bool(v) => Ok(*v),
            other => Err(self.arg_error(index, "boolean", other)),
        }
    }

    /// Byte-string argument: raw bytes or a string's UTF-8 bytes.
    pub(crate) fn arg_bytes(&self, args: &[Value], index: usize) -> Result<Bytes, ScriptError> {
        match self.arg(args, index) {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            other => Err(self.arg_error(index, "bytes", other)),
        }
    }

    pub(crate) fn arg_table(&self, args: &[Value], index: usize) -> Result<TableRef, ScriptError> {
        match self.arg(args, index) {
            Value::Table(t) => Ok(Rc::clone(t)),
            other => Err(self.arg_error(index, "table", other)),
        }
    }

    pub(crate) fn arg_list(&self, args: &[Value], index: usize) -> Result<ListRef, ScriptError> {
        match self.arg(args, index) {
            Value::List(l) => Ok(Rc::clone(l)),
            other => Err(self.arg_error(index, "list", other)),
        }
    }

    pub(crate) fn arg_func(&self, args: &[Value], index: usize) -> Result<ScriptFn, ScriptError> {
        match self.arg(args, index) {
            Value::Func(f) => Ok(Rc::clone(f)),
            other => Err(self.arg_error(index, "function", other)),
        }
    }

    // ========================================================================
    // Typed handle unboxing
    // ========================================================================

    pub(crate) fn check_buffer(&self, args: &[Value], index: usize) -> Result<Tvbuff, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Buffer)? {
            NativeObj::Buffer(tvb) => Ok(tvb),
            _ => Err(corrupt(HandleKind::Buffer)),
        }
    }

    pub(crate) fn check_tree(&self, args: &[Value], index: usize) -> Result<TreeRef, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Tree)? {
            NativeObj::Tree(tree) => Ok(tree),
            _ => Err(corrupt(HandleKind::Tree)),
        }
    }

    pub(crate) fn check_item(&self, args: &[Value], index: usize) -> Result<ItemRef, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Item)? {
            NativeObj::Item(item) => Ok(item),
            _ => Err(corrupt(HandleKind::Item)),
        }
    }

    pub(crate) fn check_pinfo(&self, args: &[Value], index: usize) -> Result<SharedPinfo, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::PacketInfo)? {
            NativeObj::PacketInfo(pinfo) => Ok(pinfo),
            _ => Err(corrupt(HandleKind::PacketInfo)),
        }
    }

    pub(crate) fn check_columns(&self, args: &[Value], index: usize) -> Result<SharedPinfo, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Columns)? {
            NativeObj::Columns(pinfo) => Ok(pinfo),
            _ => Err(corrupt(HandleKind::Columns)),
        }
    }

    pub(crate) fn check_cursor(&self, args: &[Value], index: usize) -> Result<SharedCursor, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Cursor)? {
            NativeObj::Cursor(cursor) => Ok(cursor),
            _ => Err(corrupt(HandleKind::Cursor)),
        }
    }

    pub(crate) fn check_field(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::FieldId, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Field)? {
            NativeObj::Field(id) => Ok(id),
            _ => Err(corrupt(HandleKind::Field)),
        }
    }

    pub(crate) fn check_proto(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::ProtoId, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Protocol)? {
            NativeObj::Protocol(id) => Ok(id),
            _ => Err(corrupt(HandleKind::Protocol)),
        }
    }

    pub(crate) fn check_expert(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::ExpertId, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::ExpertInfo)? {
            NativeObj::Expert(id) => Ok(id),
            _ => Err(corrupt(HandleKind::ExpertInfo)),
        }
    }

    pub(crate) fn check_expert_module(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::ExpertModuleId, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::ExpertModule)? {
            NativeObj::ExpertModule(id) => Ok(id),
            _ => Err(corrupt(HandleKind::ExpertModule)),
        }
    }

    pub(crate) fn check_vals(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<Rc<wirescript_engine::ValueStrings>, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::ValueStrings)? {
            NativeObj::Vals(vals) => Ok(vals),
            _ => Err(corrupt(HandleKind::ValueStrings)),
        }
    }

    pub(crate) fn check_dissector(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::DissectorHandle, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Dissector)? {
            NativeObj::Dissector(handle) => Ok(handle),
            _ => Err(corrupt(HandleKind::Dissector)),
        }
    }

    pub(crate) fn check_pref_module(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<wirescript_engine::PrefModuleId, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::PrefModule)? {
            NativeObj::PrefModule(id) => Ok(id),
            _ => Err(corrupt(HandleKind::PrefModule)),
        }
    }

    pub(crate) fn check_pref(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<Rc<std::cell::Cell<bool>>, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Preference)? {
            NativeObj::Preference(cell) => Ok(cell),
            _ => Err(corrupt(HandleKind::Preference)),
        }
    }

    /// An offset argument: a plain integer, or a cursor whose current
    /// position is used. The cursor (when given) is returned so the caller
    /// can record a step on it.
    pub(crate) fn check_offset(
        &self,
        args: &[Value],
        index: usize,
    ) -> Result<(i64, Option<SharedCursor>), ScriptError> {
        match self.arg(args, index) {
            Value::Int(v) => Ok((*v, None)),
            value @ Value::Handle(_) => {
                match self.unbox(value, index, HandleKind::Cursor)? {
                    NativeObj::Cursor(cursor) => {
                        let current = cursor.borrow().current();
                        Ok((current, Some(cursor)))
                    }
                    _ => Err(corrupt(HandleKind::Cursor)),
                }
            }
            other => Err(self.arg_error(index, "integer or Cursor", other)),
        }
    }
}

fn corrupt(kind: HandleKind) -> ScriptError {
    ScriptError::runtime(format!("handle table corrupted for {kind} slot"))
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic in script callable".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Wirescript;

    #[test]
    fn invoke_captures_traceback_innermost_first() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let outer: ScriptFn = Rc::new(|ctx, _| {
            let inner = Rc::new(|_: &mut ScriptCtx, _: &[Value]| {
                Err::<Vec<Value>, _>(ScriptError::runtime("boom"))
            }) as ScriptFn;
            ctx.invoke("inner", &inner, &[]).map_err(|f| f.error)
        });
        let failure = ctx.invoke("outer", &outer, &[]).unwrap_err();
        // Only the live stack at failure time: the inner failure was
        // re-raised from "outer", so the enriched frames are outer's.
        assert_eq!(failure.traceback.frames(), ["outer"]);
        assert_eq!(failure.error.to_string(), "boom");
    }

    #[test]
    fn nested_failure_keeps_both_frames() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let outer: ScriptFn = Rc::new(|ctx, _| {
            let inner = Rc::new(|_: &mut ScriptCtx, _: &[Value]| {
                Err::<Vec<Value>, _>(ScriptError::runtime("deep"))
            }) as ScriptFn;
            // Propagate the enriched failure as-is.
            match ctx.invoke("inner", &inner, &[]) {
                Ok(v) => Ok(v),
                Err(failure) => Err(ScriptError::runtime(format!("{}\n{}", failure.error, failure.traceback))),
            }
        });
        let failure = ctx.invoke("outer", &outer, &[]).unwrap_err();
        let msg = failure.error.to_string();
        assert!(msg.contains("deep"));
        assert!(msg.contains("inner"));
    }

    #[test]
    fn panic_is_caught_as_runtime_error() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let bomb: ScriptFn = Rc::new(|_, _| panic!("unexpected"));
        let failure = ctx.invoke("bomb", &bomb, &[]).unwrap_err();
        assert!(failure.error.to_string().contains("unexpected"));
        assert_eq!(failure.traceback.frames(), ["bomb"]);
        // The frame stack unwound; a later call starts clean.
        let ok: ScriptFn = Rc::new(|_, _| Ok(vec![Value::Int(1)]));
        assert_eq!(ctx.invoke("ok", &ok, &[]).unwrap(), vec![Value::Int(1)]);
    }

    #[test]
    fn missing_args_read_as_nil() {
        let plugin = Wirescript::new();
        let ctx = plugin.ctx();
        assert!(ctx.arg(&[], 1).is_nil());
        assert_eq!(ctx.opt_int(&[], 2, 7).unwrap(), 7);
        let err = ctx.arg_int(&[Value::str("x")], 1).unwrap_err();
        assert_eq!(err.to_string(), "bad argument #1: integer expected, got string");
    }
}
