//! Value-to-label table operations.
//!
//! `vals_new` duplicates every label into owned storage, so the script may
//! drop its own copy immediately. The built-in checksum-status table is
//! borrowed engine data; the handle's ownership flag says so and nothing
//! is freed through it.

use std::rc::Rc;

use wirescript_engine::{CKSUM_VALS, ValueStrings};

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::value::Value;

use crate::handle::NativeObj;

impl ScriptCtx {
    /// `vals_new({{value, label}, ...}) -> ValueStrings`
    pub fn vals_new(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let list = self.arg_list(args, 1)?;
        let mut pairs = Vec::new();
        for (i, entry) in list.borrow().iter().enumerate() {
            let Value::List(pair) = entry else {
                return Err(ScriptError::runtime(format!(
                    "vals entry {i} must be a (value, label) pair"
                )));
            };
            let pair = pair.borrow();
            match (pair.first(), pair.get(1)) {
                (Some(Value::Int(v)), Some(Value::Str(s))) => {
                    let v = u64::try_from(*v).map_err(|_| {
                        ScriptError::runtime(format!("vals entry {i}: negative value {v}"))
                    })?;
                    pairs.push((v, s.to_string()));
                }
                _ => {
                    return Err(ScriptError::runtime(format!(
                        "vals entry {i} must be a (value, label) pair"
                    )));
                }
            }
        }
        let vals = Rc::new(ValueStrings::from_pairs(pairs));
        Ok(vec![self.box_process(NativeObj::Vals(vals))])
    }

    /// `rvals_new({{low, high, label}, ...}) -> ValueStrings` over
    /// inclusive ranges.
    pub fn rvals_new(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let list = self.arg_list(args, 1)?;
        let mut ranges = Vec::new();
        for (i, entry) in list.borrow().iter().enumerate() {
            let Value::List(triple) = entry else {
                return Err(ScriptError::runtime(format!(
                    "rvals entry {i} must be a (low, high, label) triple"
                )));
            };
            let triple = triple.borrow();
            match (triple.first(), triple.get(1), triple.get(2)) {
                (Some(Value::Int(lo)), Some(Value::Int(hi)), Some(Value::Str(s))) => {
                    let lo = u64::try_from(*lo).map_err(|_| {
                        ScriptError::runtime(format!("rvals entry {i}: negative value {lo}"))
                    })?;
                    let hi = u64::try_from(*hi).map_err(|_| {
                        ScriptError::runtime(format!("rvals entry {i}: negative value {hi}"))
                    })?;
                    ranges.push((lo, hi, s.to_string()));
                }
                _ => {
                    return Err(ScriptError::runtime(format!(
                        "rvals entry {i} must be a (low, high, label) triple"
                    )));
                }
            }
        }
        let vals = Rc::new(ValueStrings::OwnedRange(ranges));
        Ok(vec![self.box_process(NativeObj::Vals(vals))])
    }

    /// `val_to_str(value, vals, fallback_fmt) -> string`
    pub fn val_to_str(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let value = self.arg_int(args, 1)?;
        let vals = self.check_vals(args, 2)?;
        let fallback = self.opt_str(args, 3, "Unknown ({})")?;
        Ok(vec![Value::from(vals.to_str(value as u64, &fallback))])
    }

    /// `cksum_vals() -> ValueStrings`: the borrowed built-in
    /// checksum-status table.
    pub fn cksum_vals(&mut self, _args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let vals = Rc::new(ValueStrings::Static(CKSUM_VALS));
        Ok(vec![self.box_process(NativeObj::Vals(vals))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Wirescript;

    #[test]
    fn negative_vals_entries_are_rejected() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let list = Value::list_from(vec![Value::list_from(vec![
            Value::Int(-1),
            Value::str("bad"),
        ])]);
        let err = ctx.vals_new(&[list]).unwrap_err();
        assert!(err.to_string().contains("vals entry 0: negative value -1"));
    }

    #[test]
    fn negative_rvals_bounds_are_rejected() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let ranges = Value::list_from(vec![Value::list_from(vec![
            Value::Int(0),
            Value::Int(-5),
            Value::str("bad"),
        ])]);
        let err = ctx.rvals_new(&[ranges]).unwrap_err();
        assert!(err.to_string().contains("rvals entry 0: negative value -5"));
    }
}
