//! Expert-info operations.
//!
//! `expert_register_field_array` follows the same in-place rewrite
//! convention as the field-array adapter: spec tables become bound
//! ExpertInfo handles, bound entries pass through.

use wirescript_engine::{ExpertGroup, ExpertInfo, ExpertSeverity};

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::{HandleKind, NativeObj};
use crate::value::{TableRef, Value};

fn parse_group(name: &str) -> Result<ExpertGroup, ScriptError> {
    match name {
        "checksum" => Ok(ExpertGroup::Checksum),
        "malformed" => Ok(ExpertGroup::Malformed),
        "protocol" => Ok(ExpertGroup::Protocol),
        "undecoded" => Ok(ExpertGroup::Undecoded),
        other => Err(ScriptError::runtime(format!("unknown expert group '{other}'"))),
    }
}

fn parse_severity(name: &str) -> Result<ExpertSeverity, ScriptError> {
    match name {
        "comment" => Ok(ExpertSeverity::Comment),
        "note" => Ok(ExpertSeverity::Note),
        "warn" => Ok(ExpertSeverity::Warn),
        "error" => Ok(ExpertSeverity::Error),
        other => Err(ScriptError::runtime(format!(
            "unknown expert severity '{other}'"
        ))),
    }
}

impl ScriptCtx {
    /// `expert_register_protocol(proto) -> ExpertModule`
    pub fn expert_register_protocol(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let proto = self.check_proto(args, 1)?;
        let module = self.core.borrow_mut().experts.register_protocol(proto);
        Ok(vec![self.box_process(NativeObj::ExpertModule(module))])
    }

    /// `expert_register_field_array(module, entries)`: binds every spec
    /// table `{name, group, severity, summary}` and rewrites it in place.
    pub fn expert_register_field_array(
        &mut self,
        args: &[Value],
    ) -> Result<Vec<Value>, ScriptError> {
        let module = self.check_expert_module(args, 1)?;
        let table = self.arg_table(args, 2)?;
        let entries: Vec<(String, Value)> = table
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in entries {
            match value {
                Value::Handle(handle) if handle.kind == HandleKind::ExpertInfo => {}
                Value::Table(spec) => {
                    let info = parse_expert_spec(&spec)?;
                    let id = self.core.borrow_mut().experts.register_info(module, info);
                    let bound = self.box_process(NativeObj::Expert(id));
                    table.borrow_mut().insert(key, bound);
                }
                other => {
                    return Err(ScriptError::runtime(format!(
                        "expert array entry '{key}' must be a spec table or ExpertInfo handle, got {}",
                        other.type_name()
                    )));
                }
            }
        }
        Ok(vec![])
    }

    /// `expert_add_info(item, expert, pinfo, msg?)`: attaches an expert
    /// entry to an item; with a message it replaces the default summary.
    pub fn expert_add_info(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let item = self.check_item(args, 1)?;
        let expert = self.check_expert(args, 2)?;
        // The packet argument is validated but not consumed here.
        self.check_pinfo(args, 3)?;
        let message = match self.arg(args, 4) {
            Value::Nil => None,
            Value::Str(s) => Some(s.to_string()),
            other => {
                return Err(ScriptError::ArgError {
                    index: 4,
                    expected: "string",
                    found: other.type_name(),
                });
            }
        };
        item.add_expert(expert, message);
        Ok(vec![])
    }
}

fn parse_expert_spec(spec: &TableRef) -> Result<ExpertInfo, ScriptError> {
    let spec = spec.borrow();
    let get = |key: &str| spec.get(key).cloned().unwrap_or(Value::Nil);

    let Value::Str(name) = get("name") else {
        return Err(ScriptError::runtime("expert spec: 'name' must be a string"));
    };
    let Value::Str(group) = get("group") else {
        return Err(ScriptError::runtime("expert spec: 'group' must be a string"));
    };
    let Value::Str(severity) = get("severity") else {
        return Err(ScriptError::runtime(
            "expert spec: 'severity' must be a string",
        ));
    };
    let Value::Str(summary) = get("summary") else {
        return Err(ScriptError::runtime(
            "expert spec: 'summary' must be a string",
        ));
    };

    Ok(ExpertInfo {
        name: name.to_string(),
        group: parse_group(&group)?,
        severity: parse_severity(&severity)?,
        summary: summary.to_string(),
    })
}
