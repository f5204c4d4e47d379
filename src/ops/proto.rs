//! Protocol, field, subtree, tree, and cursor operations.
//!
//! The registration adapters consume declarative tables and rewrite them in
//! place: a field-array entry given as a spec table comes back as a bound
//! Field handle, a subtree-array key gets its minted Subtree handle as the
//! value. A second pass over the same table is harmless because bound
//! entries pass through untouched.

use std::rc::Rc;

use wirescript_engine::{
    ChecksumFlags, Encoding, FieldDisplay, FieldInfo, FieldType, TypedValue, ValueStrings,
};

use crate::ctx::ScriptCtx;
use crate::cursor::{Cursor, SharedCursor};
use crate::error::ScriptError;
use crate::handle::{HandleKind, NativeObj};
use crate::value::{TableRef, Value};

fn to_offset(value: i64) -> Result<usize, ScriptError> {
    usize::try_from(value).map_err(|_| ScriptError::runtime(format!("negative offset {value}")))
}

/// Records an emitted item's length on the cursor, when one was used.
fn step(cursor: &Option<SharedCursor>, len: i64) {
    if let Some(cursor) = cursor {
        cursor.borrow_mut().record_step(len);
    }
}

impl ScriptCtx {
    // ========================================================================
    // Registration
    // ========================================================================

    /// `register_protocol(name, short_name, filter_name) -> Protocol`
    pub fn register_protocol(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let name = self.arg_str(args, 1)?;
        let short_name = self.arg_str(args, 2)?;
        let filter_name = self.arg_str(args, 3)?;
        let proto = self
            .core
            .borrow_mut()
            .fields
            .register_protocol(&name, &short_name, &filter_name);
        Ok(vec![self.box_process(NativeObj::Protocol(proto))])
    }

    /// `register_field_array(proto, fields)`: binds every spec-table entry
    /// and rewrites it in place as a Field handle. Entries already bound
    /// pass through, so running the array twice is safe.
    pub fn register_field_array(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let proto = self.check_proto(args, 1)?;
        let table = self.arg_table(args, 2)?;
        let entries: Vec<(String, Value)> = table
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in entries {
            match value {
                Value::Handle(handle) if handle.kind == HandleKind::Field => {}
                Value::Table(spec) => {
                    let info = self.parse_field_spec(&spec)?;
                    let field = self.core.borrow_mut().fields.register_field(proto, info);
                    let bound = self.box_process(NativeObj::Field(field));
                    table.borrow_mut().insert(key, bound);
                }
                other => {
                    return Err(ScriptError::runtime(format!(
                        "field array entry '{key}' must be a spec table or Field handle, got {}",
                        other.type_name()
                    )));
                }
            }
        }
        Ok(vec![])
    }

    /// `register_subtree_array(subtrees)`: mints a subtree per key and
    /// writes the handle back as the entry value.
    pub fn register_subtree_array(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let table = self.arg_table(args, 1)?;
        let keys: Vec<String> = table.borrow().keys().cloned().collect();
        for key in keys {
            let already_bound = matches!(
                table.borrow().get(&key),
                Some(Value::Handle(handle)) if handle.kind == HandleKind::Subtree
            );
            if already_bound {
                continue;
            }
            let ett = self.core.borrow_mut().fields.register_subtree();
            let bound = self.box_process(NativeObj::Subtree(ett));
            table.borrow_mut().insert(key, bound);
        }
        Ok(vec![])
    }

    /// Parses a declarative field-spec table: `{name, abbrev, type,
    /// display?, strings?, bitmask?, blurb?}`.
    fn parse_field_spec(&self, spec: &TableRef) -> Result<FieldInfo, ScriptError> {
        let spec = spec.borrow();
        let get = |key: &str| spec.get(key).cloned().unwrap_or(Value::Nil);

        let Value::Str(name) = get("name") else {
            return Err(ScriptError::runtime("field spec: 'name' must be a string"));
        };
        let Value::Str(abbrev) = get("abbrev") else {
            return Err(ScriptError::runtime("field spec: 'abbrev' must be a string"));
        };
        let Value::Int(ftype) = get("type") else {
            return Err(ScriptError::runtime("field spec: 'type' must be an integer"));
        };
        let ftype = u32::try_from(ftype)
            .ok()
            .and_then(|v| FieldType::try_from(v).ok())
            .ok_or_else(|| ScriptError::runtime(format!("field spec: unknown field type {ftype}")))?;

        let display = match get("display") {
            Value::Nil => FieldDisplay::None,
            Value::Int(v) => u32::try_from(v)
                .ok()
                .and_then(|v| FieldDisplay::try_from(v).ok())
                .ok_or_else(|| ScriptError::runtime(format!("field spec: unknown display base {v}")))?,
            other => {
                return Err(ScriptError::ArgError {
                    index: 2,
                    expected: "integer",
                    found: other.type_name(),
                });
            }
        };

        let strings: Option<Rc<ValueStrings>> = match get("strings") {
            Value::Nil => None,
            value @ Value::Handle(_) => {
                match self.unbox(&value, 2, HandleKind::ValueStrings)? {
                    NativeObj::Vals(vals) => Some(vals),
                    _ => return Err(ScriptError::runtime("handle table corrupted for ValueStrings slot")),
                }
            }
            other => {
                return Err(ScriptError::ArgError {
                    index: 2,
                    expected: "ValueStrings",
                    found: other.type_name(),
                });
            }
        };

        let bitmask = match get("bitmask") {
            Value::Nil => 0,
            Value::Int(v) => v as u64,
            other => {
                return Err(ScriptError::ArgError {
                    index: 2,
                    expected: "integer",
                    found: other.type_name(),
                });
            }
        };

        let blurb = match get("blurb") {
            Value::Nil => None,
            Value::Str(s) => Some(s.to_string()),
            other => {
                return Err(ScriptError::ArgError {
                    index: 2,
                    expected: "string",
                    found: other.type_name(),
                });
            }
        };

        Ok(FieldInfo {
            name: name.to_string(),
            abbrev: abbrev.to_string(),
            ftype,
            display,
            strings,
            bitmask,
            blurb,
        })
    }

    // ========================================================================
    // Tree additions
    // ========================================================================

    fn opt_encoding(&self, args: &[Value], index: usize) -> Result<Encoding, ScriptError> {
        let raw = self.opt_int(args, index, i64::from(u32::from(Encoding::BigEndian)))?;
        u32::try_from(raw)
            .ok()
            .and_then(|v| Encoding::try_from(v).ok())
            .ok_or_else(|| ScriptError::runtime(format!("unknown encoding {raw}")))
    }

    fn opt_item_flags(&self, args: &[Value], index: usize) -> Result<(bool, bool), ScriptError> {
        match self.arg(args, index) {
            Value::Nil => Ok((false, false)),
            Value::Table(table) => {
                let table = table.borrow();
                let truthy = |key: &str| {
                    !matches!(table.get(key), None | Some(Value::Nil) | Some(Value::Bool(false)))
                };
                Ok((truthy("hidden"), truthy("generated")))
            }
            other => Err(ScriptError::ArgError {
                index,
                expected: "table",
                found: other.type_name(),
            }),
        }
    }

    /// `tree:add_item(field, tvb, offset, length, enc?, options?) -> item`
    pub fn tree_add_item(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tree = self.check_tree(args, 1)?;
        let field = self.check_field(args, 2)?;
        let tvb = self.check_buffer(args, 3)?;
        let (offset, cursor) = self.check_offset(args, 4)?;
        let length = self.arg_int(args, 5)?;
        let enc = self.opt_encoding(args, 6)?;
        let (hidden, generated) = self.opt_item_flags(args, 7)?;

        let item = tree.add_item(field, &tvb, to_offset(offset)?, length, enc)?;
        if hidden {
            item.set_hidden();
        }
        if generated {
            item.set_generated();
        }
        step(&cursor, length);
        Ok(vec![self.box_local(NativeObj::Item(item))])
    }

    /// `tree:add_item_ret(field, tvb, offset, length, enc?) -> value, item`
    pub fn tree_add_item_ret(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tree = self.check_tree(args, 1)?;
        let field = self.check_field(args, 2)?;
        let tvb = self.check_buffer(args, 3)?;
        let (offset, cursor) = self.check_offset(args, 4)?;
        let length = self.arg_int(args, 5)?;
        let enc = self.opt_encoding(args, 6)?;

        let info = self
            .core
            .borrow()
            .fields
            .field(field)
            .cloned()
            .ok_or_else(|| ScriptError::runtime("field is not registered"))?;
        let (item, value) = tree.add_item_ret(field, &info, &tvb, to_offset(offset)?, length, enc)?;
        let ret = match value {
            TypedValue::Bool(b) => Value::Bool(b),
            TypedValue::Uint(v) => Value::Int(v as i64),
            TypedValue::Int(v) => Value::Int(v),
            TypedValue::Str(s) => Value::from(s),
            TypedValue::Addr(addr) => self.box_local(NativeObj::Address(addr)),
        };
        step(&cursor, length);
        let item = self.box_local(NativeObj::Item(item));
        Ok(vec![ret, item])
    }

    /// `tree:add_protocol(proto, tvb, offset, length) -> item`
    pub fn tree_add_protocol(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tree = self.check_tree(args, 1)?;
        let proto = self.check_proto(args, 2)?;
        let tvb = self.check_buffer(args, 3)?;
        let (offset, cursor) = self.check_offset(args, 4)?;
        let length = self.arg_int(args, 5)?;

        let item = tree.add_protocol(proto, &tvb, to_offset(offset)?, length)?;
        step(&cursor, length);
        Ok(vec![self.box_local(NativeObj::Item(item))])
    }

    /// `tree:add_checksum(tvb, offset, hf, hf_status, expert?, pinfo?,
    /// computed, enc, flags) -> item`
    ///
    /// The cursor (when used for the offset) steps by the checksum width.
    pub fn tree_add_checksum(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tree = self.check_tree(args, 1)?;
        let tvb = self.check_buffer(args, 2)?;
        let (offset, cursor) = self.check_offset(args, 3)?;
        let field = self.check_field(args, 4)?;
        let status_field = match self.arg(args, 5) {
            Value::Nil => None,
            _ => Some(self.check_field(args, 5)?),
        };
        let expert = match self.arg(args, 6) {
            Value::Nil => None,
            _ => Some(self.check_expert(args, 6)?),
        };
        if !self.arg(args, 7).is_nil() {
            // Validated but not consumed here.
            self.check_pinfo(args, 7)?;
        }
        let computed = self.arg_int(args, 8)?;
        let computed = u16::try_from(computed)
            .map_err(|_| ScriptError::runtime(format!("checksum {computed} out of range")))?;
        let enc = self.opt_encoding(args, 9)?;
        let flags = ChecksumFlags::from_bits_truncate(self.arg_int(args, 10)? as u32);

        let (item, _status) = tree.add_checksum(
            &tvb,
            to_offset(offset)?,
            field,
            status_field,
            computed,
            expert,
            enc,
            flags,
        )?;
        step(&cursor, 2);
        Ok(vec![self.box_local(NativeObj::Item(item))])
    }

    // ========================================================================
    // Item decoration
    // ========================================================================

    /// `item:add_subtree(ett) -> tree`
    pub fn item_add_subtree(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let item = self.check_item(args, 1)?;
        let ett = match self.unbox(self.arg(args, 2), 2, HandleKind::Subtree)? {
            NativeObj::Subtree(id) => id,
            _ => return Err(ScriptError::runtime("handle table corrupted for Subtree slot")),
        };
        let tree = item.add_subtree(ett);
        Ok(vec![self.box_local(NativeObj::Tree(tree))])
    }

    /// `item:append_text(text)`
    pub fn item_append_text(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let item = self.check_item(args, 1)?;
        let text = self.arg_str(args, 2)?;
        item.append_text(&*text);
        Ok(vec![])
    }

    /// `item:set_hidden()`
    pub fn item_set_hidden(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let item = self.check_item(args, 1)?;
        item.set_hidden();
        Ok(vec![])
    }

    /// `item:set_generated()`
    pub fn item_set_generated(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let item = self.check_item(args, 1)?;
        item.set_generated();
        Ok(vec![])
    }

    // ========================================================================
    // Cursors
    // ========================================================================

    /// `Cursor.new(start?) -> cursor`
    pub fn cursor_new(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let start = self.opt_int(args, 1, 0)?;
        let cursor = Cursor::new(start).shared();
        Ok(vec![self.box_local(NativeObj::Cursor(cursor))])
    }

    /// `cursor:advance(len?) -> new position`
    pub fn cursor_advance(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cursor = self.check_cursor(args, 1)?;
        let len = self.opt_int(args, 2, 0)?;
        let current = cursor.borrow_mut().advance(len);
        Ok(vec![Value::Int(current)])
    }

    /// `cursor:current() -> position`
    pub fn cursor_current(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cursor = self.check_cursor(args, 1)?;
        let current = cursor.borrow().current();
        Ok(vec![Value::Int(current)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Wirescript;
    use bytes::Bytes;
    use wirescript_engine::{ProtoTree, Tvbuff};

    #[test]
    fn checksum_value_must_fit_sixteen_bits() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let proto = ctx
            .register_protocol(&[Value::str("Test"), Value::str("TEST"), Value::str("test")])
            .unwrap()
            .remove(0);
        let fields = Value::table_from([(
            "cksum",
            Value::table_from([
                ("name", Value::str("Checksum")),
                ("abbrev", Value::str("test.cksum")),
                ("type", Value::Int(i64::from(u32::from(FieldType::Uint16)))),
            ]),
        )]);
        ctx.register_field_array(&[proto, fields.clone()]).unwrap();
        let Value::Table(map) = &fields else { unreachable!() };
        let field = map.borrow().get("cksum").cloned().unwrap();

        let tree = ctx.box_local(NativeObj::Tree(ProtoTree::new()));
        let tvb = ctx.box_local(NativeObj::Buffer(Tvbuff::new(Bytes::from_static(&[
            0x12, 0x34,
        ]))));
        let mut args = vec![
            tree,
            tvb,
            Value::Int(0),
            field,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Int(0x1_0000),
            Value::Nil,
            Value::Int(i64::from(ChecksumFlags::VERIFY.bits())),
        ];
        let err = ctx.tree_add_checksum(&args).unwrap_err();
        assert!(err.to_string().contains("checksum 65536 out of range"));

        args[7] = Value::Int(-1);
        let err = ctx.tree_add_checksum(&args).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        args[7] = Value::Int(0x1234);
        assert!(ctx.tree_add_checksum(&args).is_ok());
    }
}
