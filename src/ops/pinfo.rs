//! Packet metadata and column operations.

use wirescript_engine::{Address, ColumnId};

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::{HandleKind, NativeObj};
use crate::value::Value;

impl ScriptCtx {
    /// `current_packet() -> PacketInfo`: the packet bound by
    /// `dissect_init`. Use outside a dissection pass is an error, never a
    /// read of stale metadata.
    pub fn current_packet(&mut self, _args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let pinfo = self.core.borrow().current_packet.clone();
        match pinfo {
            Some(pinfo) => Ok(vec![self.box_local(NativeObj::PacketInfo(pinfo))]),
            None => Err(ScriptError::runtime("no packet is being dissected")),
        }
    }

    /// `pinfo:get(key) -> value`
    pub fn pinfo_get(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let pinfo = self.check_pinfo(args, 1)?;
        let key = self.arg_str(args, 2)?;
        enum Fetched {
            Plain(Value),
            Addr(Option<Address>),
        }
        let fetched = {
            let pinfo = pinfo.borrow();
            match &*key {
                "src_port" => Fetched::Plain(Value::Int(i64::from(pinfo.src_port))),
                "dst_port" => Fetched::Plain(Value::Int(i64::from(pinfo.dst_port))),
                "fragmented" => Fetched::Plain(Value::Bool(pinfo.fragmented)),
                "in_error_pkt" => Fetched::Plain(Value::Bool(pinfo.in_error_pkt)),
                "src" => Fetched::Addr(pinfo.src.clone()),
                "dst" => Fetched::Addr(pinfo.dst.clone()),
                "net_src" => Fetched::Addr(pinfo.net_src.clone()),
                "net_dst" => Fetched::Addr(pinfo.net_dst.clone()),
                "dl_src" => Fetched::Addr(pinfo.dl_src.clone()),
                "dl_dst" => Fetched::Addr(pinfo.dl_dst.clone()),
                other => {
                    return Err(ScriptError::runtime(format!(
                        "unknown packet field '{other}'"
                    )));
                }
            }
        };
        let value = match fetched {
            Fetched::Plain(value) => value,
            Fetched::Addr(Some(addr)) => self.box_local(NativeObj::Address(addr)),
            Fetched::Addr(None) => Value::Nil,
        };
        Ok(vec![value])
    }

    /// `pinfo:set(key, value)`
    pub fn pinfo_set(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let pinfo = self.check_pinfo(args, 1)?;
        let key = self.arg_str(args, 2)?;
        match &*key {
            "src_port" => pinfo.borrow_mut().src_port = self.arg_int(args, 3)? as u32,
            "dst_port" => pinfo.borrow_mut().dst_port = self.arg_int(args, 3)? as u32,
            "fragmented" => pinfo.borrow_mut().fragmented = self.arg_bool(args, 3)?,
            "in_error_pkt" => pinfo.borrow_mut().in_error_pkt = self.arg_bool(args, 3)?,
            "src" | "dst" | "net_src" | "net_dst" | "dl_src" | "dl_dst" => {
                let addr = self.check_address(args, 3)?;
                let mut pinfo = pinfo.borrow_mut();
                let slot = match &*key {
                    "src" => &mut pinfo.src,
                    "dst" => &mut pinfo.dst,
                    "net_src" => &mut pinfo.net_src,
                    "net_dst" => &mut pinfo.net_dst,
                    "dl_src" => &mut pinfo.dl_src,
                    _ => &mut pinfo.dl_dst,
                };
                *slot = Some(addr);
            }
            other => {
                return Err(ScriptError::runtime(format!(
                    "unknown packet field '{other}'"
                )));
            }
        }
        Ok(vec![])
    }

    /// `pinfo:set_net_addr(src, dst)`: sets the network-layer addresses,
    /// which also become the current top-of-stack pair.
    pub fn pinfo_set_net_addr(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let pinfo = self.check_pinfo(args, 1)?;
        let src = self.check_address(args, 2)?;
        let dst = self.check_address(args, 3)?;
        pinfo.borrow_mut().set_net_addr(src, dst);
        Ok(vec![])
    }

    pub(crate) fn check_address(&self, args: &[Value], index: usize) -> Result<Address, ScriptError> {
        match self.unbox(self.arg(args, index), index, HandleKind::Address)? {
            NativeObj::Address(addr) => Ok(addr),
            _ => Err(ScriptError::runtime("handle table corrupted for Address slot")),
        }
    }

    // ========================================================================
    // Columns
    // ========================================================================

    fn check_column(&self, args: &[Value], index: usize) -> Result<ColumnId, ScriptError> {
        let raw = self.arg_int(args, index)?;
        u32::try_from(raw)
            .ok()
            .and_then(|v| ColumnId::try_from(v).ok())
            .ok_or_else(|| ScriptError::runtime(format!("unknown column {raw}")))
    }

    /// `cols:set(col, text)`
    pub fn col_set(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cols = self.check_columns(args, 1)?;
        let col = self.check_column(args, 2)?;
        let text = self.arg_str(args, 3)?;
        cols.borrow_mut().cols.set(col, &text);
        Ok(vec![])
    }

    /// `cols:append(col, text)`
    pub fn col_append(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cols = self.check_columns(args, 1)?;
        let col = self.check_column(args, 2)?;
        let text = self.arg_str(args, 3)?;
        cols.borrow_mut().cols.append(col, &text);
        Ok(vec![])
    }

    /// `cols:clear(col)`
    pub fn col_clear(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cols = self.check_columns(args, 1)?;
        let col = self.check_column(args, 2)?;
        cols.borrow_mut().cols.clear(col);
        Ok(vec![])
    }

    /// `cols:get(col) -> string`
    pub fn col_get(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cols = self.check_columns(args, 1)?;
        let col = self.check_column(args, 2)?;
        let text = cols.borrow().cols.get(col).to_owned();
        Ok(vec![Value::from(text)])
    }
}
