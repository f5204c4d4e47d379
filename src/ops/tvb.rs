//! Buffer read operations.
//!
//! Thin wrappers over the engine's bounds-checked reads. A failed read is
//! the engine's fault value, propagated untouched so dispatch can re-raise
//! it.

use bytes::Bytes;
use wirescript_engine::Tvbuff;

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::NativeObj;
use crate::value::Value;

fn to_offset(value: i64) -> Result<usize, ScriptError> {
    usize::try_from(value).map_err(|_| ScriptError::runtime(format!("negative offset {value}")))
}

impl ScriptCtx {
    /// `tvb:get_u8(offset) -> integer`
    pub fn tvb_get_u8(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        Ok(vec![Value::Int(i64::from(tvb.get_u8(to_offset(offset)?)?))])
    }

    /// `tvb:get_ntohs(offset) -> integer` (network byte order)
    pub fn tvb_get_ntohs(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        Ok(vec![Value::Int(i64::from(tvb.get_ntohs(to_offset(offset)?)?))])
    }

    /// `tvb:get_ipv4(offset) -> IPv4`
    pub fn tvb_get_ipv4(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        let ip = tvb.get_ipv4(to_offset(offset)?)?;
        Ok(vec![self.box_local(NativeObj::Ipv4(ip))])
    }

    /// `tvb:get_ipv6(offset) -> IPv6`
    pub fn tvb_get_ipv6(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        let ip = tvb.get_ipv6(to_offset(offset)?)?;
        Ok(vec![self.box_local(NativeObj::Ipv6(ip))])
    }

    /// `tvb:get_bytes(offset, len?) -> bytes` (no length = remainder)
    pub fn tvb_get_bytes(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        let len = match self.arg(args, 3) {
            Value::Nil => None,
            Value::Int(v) => Some(
                usize::try_from(*v)
                    .map_err(|_| ScriptError::runtime(format!("negative length {v}")))?,
            ),
            other => {
                return Err(ScriptError::ArgError {
                    index: 3,
                    expected: "integer",
                    found: other.type_name(),
                });
            }
        };
        let raw = tvb.get_bytes(to_offset(offset)?, len)?;
        Ok(vec![Value::Bytes(raw)])
    }

    /// `tvb:captured_length() -> integer`
    pub fn tvb_captured_length(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        Ok(vec![Value::Int(tvb.captured_length() as i64)])
    }

    /// `tvb:captured_length_remaining(offset) -> integer`
    pub fn tvb_captured_length_remaining(
        &mut self,
        args: &[Value],
    ) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        Ok(vec![Value::Int(
            tvb.captured_length_remaining(to_offset(offset)?) as i64,
        )])
    }

    /// `tvb:reported_length() -> integer`
    pub fn tvb_reported_length(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        Ok(vec![Value::Int(tvb.reported_length() as i64)])
    }

    /// `tvb:subset_remaining(offset) -> tvb`
    pub fn tvb_subset_remaining(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let tvb = self.check_buffer(args, 1)?;
        let (offset, _) = self.check_offset(args, 2)?;
        let sub = tvb.subset_remaining(to_offset(offset)?)?;
        Ok(vec![self.box_local(NativeObj::Buffer(sub))])
    }

    /// `tvb_from_data(bytes, reported_len?) -> tvb`
    pub fn tvb_from_data(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let data: Bytes = self.arg_bytes(args, 1)?;
        let reported = self.opt_int(args, 2, data.len() as i64)?;
        let reported = usize::try_from(reported)
            .map_err(|_| ScriptError::runtime(format!("negative reported length {reported}")))?;
        let tvb = Tvbuff::from_data(data, reported);
        Ok(vec![self.box_local(NativeObj::Buffer(tvb))])
    }
}
