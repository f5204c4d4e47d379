//! Address construction and display.

use std::net::{Ipv4Addr, Ipv6Addr};

use wirescript_engine::{Address, AddressType};

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::{Handle, HandleKind, NativeObj};
use crate::value::Value;

impl ScriptCtx {
    /// `Address.ipv4(str) -> IPv4`
    pub fn addr_ipv4(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let text = self.arg_str(args, 1)?;
        let ip: Ipv4Addr = text
            .parse()
            .map_err(|_| ScriptError::runtime(format!("error converting IPv4 string '{text}'")))?;
        Ok(vec![self.box_local(NativeObj::Ipv4(ip))])
    }

    /// `Address.ipv6(str) -> IPv6`
    pub fn addr_ipv6(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let text = self.arg_str(args, 1)?;
        let ip: Ipv6Addr = text
            .parse()
            .map_err(|_| ScriptError::runtime(format!("error converting IPv6 string '{text}'")))?;
        Ok(vec![self.box_local(NativeObj::Ipv6(ip))])
    }

    /// `Address.new(type, str) -> Address`, or `Address.new(ipv4|ipv6) ->
    /// Address` from an already-typed handle.
    pub fn addr_new(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let addr = match self.arg(args, 1) {
            Value::Int(raw) => {
                let atype = u32::try_from(*raw)
                    .ok()
                    .and_then(|v| AddressType::try_from(v).ok())
                    .ok_or_else(|| {
                        ScriptError::runtime(format!("unknown address type {raw}"))
                    })?;
                let text = self.arg_str(args, 2)?;
                match atype {
                    AddressType::Ipv4 => Address::Ipv4(text.parse().map_err(|_| {
                        ScriptError::runtime(format!("error converting IPv4 string '{text}'"))
                    })?),
                    AddressType::Ipv6 => Address::Ipv6(text.parse().map_err(|_| {
                        ScriptError::runtime(format!("error converting IPv6 string '{text}'"))
                    })?),
                    AddressType::None => {
                        return Err(ScriptError::runtime("unknown address type 0"));
                    }
                }
            }
            Value::Handle(Handle {
                kind: HandleKind::Ipv4,
                ..
            }) => match self.unbox(self.arg(args, 1), 1, HandleKind::Ipv4)? {
                NativeObj::Ipv4(ip) => Address::Ipv4(ip),
                _ => return Err(ScriptError::runtime("handle table corrupted for IPv4 slot")),
            },
            Value::Handle(Handle {
                kind: HandleKind::Ipv6,
                ..
            }) => match self.unbox(self.arg(args, 1), 1, HandleKind::Ipv6)? {
                NativeObj::Ipv6(ip) => Address::Ipv6(ip),
                _ => return Err(ScriptError::runtime("handle table corrupted for IPv6 slot")),
            },
            other => {
                return Err(ScriptError::ArgError {
                    index: 1,
                    expected: "address type or IPv4/IPv6",
                    found: other.type_name(),
                });
            }
        };
        Ok(vec![self.box_local(NativeObj::Address(addr))])
    }

    /// `addr:to_str() -> string`, accepting Address, IPv4, or IPv6.
    pub fn addr_to_str(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let text = match self.arg(args, 1) {
            Value::Handle(Handle {
                kind: HandleKind::Ipv4,
                ..
            }) => match self.unbox(self.arg(args, 1), 1, HandleKind::Ipv4)? {
                NativeObj::Ipv4(ip) => ip.to_string(),
                _ => return Err(ScriptError::runtime("handle table corrupted for IPv4 slot")),
            },
            Value::Handle(Handle {
                kind: HandleKind::Ipv6,
                ..
            }) => match self.unbox(self.arg(args, 1), 1, HandleKind::Ipv6)? {
                NativeObj::Ipv6(ip) => ip.to_string(),
                _ => return Err(ScriptError::runtime("handle table corrupted for IPv6 slot")),
            },
            _ => self.check_address(args, 1)?.to_string(),
        };
        Ok(vec![Value::from(text)])
    }

    /// `addr:pack() -> bytes` (network order)
    pub fn addr_pack(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let addr = self.check_address(args, 1)?;
        Ok(vec![Value::Bytes(addr.pack())])
    }
}
