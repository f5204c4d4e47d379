//! Logging, checksum, and output utilities.
//!
//! Script log messages forward to the process logger with a level gate.
//! The `critical` and `error` levels are host-only: scripts must fail
//! through the error path, not crash-log, so those names are rejected.

use log::Level;
use wirescript_engine::cksum::in_cksum;

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::value::Value;

fn check_log_level(name: &str) -> Result<Level, ScriptError> {
    match name {
        "noisy" => Ok(Level::Trace),
        "debug" => Ok(Level::Debug),
        "info" | "message" => Ok(Level::Info),
        "warning" => Ok(Level::Warn),
        "critical" | "error" => Err(ScriptError::runtime(format!(
            "level \"{name}\" is not a valid script log level"
        ))),
        other => Err(ScriptError::runtime(format!("unknown log level \"{other}\""))),
    }
}

impl ScriptCtx {
    /// `log(domain, level, message)`
    pub fn log(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let domain = self.arg_str(args, 1)?;
        let level = check_log_level(&self.arg_str(args, 2)?)?;
        let message = self.arg_str(args, 3)?;
        log::log!(target: "wirescript", level, "[{domain}] {message}");
        Ok(vec![])
    }

    /// `logf(domain, level, message)`: also names the call site, taken
    /// from the live frame stack.
    pub fn logf(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let domain = self.arg_str(args, 1)?;
        let level = check_log_level(&self.arg_str(args, 2)?)?;
        let message = self.arg_str(args, 3)?;
        let site = self.current_frame().unwrap_or("?").to_owned();
        log::log!(target: "wirescript", level, "[{domain}] {site}: {message}");
        Ok(vec![])
    }

    /// `in_cksum(bytes, ...) -> integer`: Internet checksum over the
    /// concatenation of every byte-string argument.
    pub fn in_cksum(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let mut chunks = Vec::with_capacity(args.len());
        for index in 1..=args.len() {
            chunks.push(self.arg_bytes(args, index)?);
        }
        let refs: Vec<&[u8]> = chunks.iter().map(|b| b.as_ref()).collect();
        Ok(vec![Value::Int(i64::from(in_cksum(&refs)))])
    }

    /// `print(message)`: writes through the interpreter's output sink.
    pub fn print_op(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let message = self.arg_str(args, 1)?;
        self.print(&message);
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Wirescript;
    use std::rc::Rc;

    #[test]
    fn crash_levels_are_rejected() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        for level in ["critical", "error"] {
            let args = vec![Value::str("demo"), Value::str(level), Value::str("x")];
            let err = ctx.log(&args).unwrap_err();
            assert!(err.to_string().contains("not a valid script log level"));
        }
        let args = vec![Value::str("demo"), Value::str("warning"), Value::str("x")];
        assert!(ctx.log(&args).is_ok());
    }

    #[test]
    fn in_cksum_accepts_split_chunks() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let whole = ctx
            .in_cksum(&[Value::Bytes(bytes::Bytes::from_static(&[0x45, 0x00, 0x00, 0x73]))])
            .unwrap();
        let split = ctx
            .in_cksum(&[
                Value::Bytes(bytes::Bytes::from_static(&[0x45])),
                Value::Bytes(bytes::Bytes::from_static(&[0x00, 0x00])),
                Value::Bytes(bytes::Bytes::from_static(&[0x73])),
            ])
            .unwrap();
        assert_eq!(whole, split);
    }

    #[test]
    fn logf_names_the_live_frame() {
        let plugin = Wirescript::new();
        let mut ctx = plugin.ctx();
        let body: crate::value::ScriptFn = Rc::new(|ctx, _| {
            assert_eq!(ctx.current_frame(), Some("caller"));
            ctx.logf(&[
                Value::str("demo"),
                Value::str("debug"),
                Value::str("inside"),
            ])
        });
        ctx.invoke("caller", &body, &[]).unwrap();
        assert_eq!(ctx.current_frame(), None);
    }
}
