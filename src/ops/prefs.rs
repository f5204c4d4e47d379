//! Preference operations.

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::NativeObj;
use crate::value::Value;

impl ScriptCtx {
    /// `prefs_register_protocol(proto) -> PrefModule`
    pub fn prefs_register_protocol(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let proto = self.check_proto(args, 1)?;
        let module = self.core.borrow_mut().prefs.register_protocol(proto);
        Ok(vec![self.box_process(NativeObj::PrefModule(module))])
    }

    /// `prefs_register_bool(module, name, title, description, default) ->
    /// Preference`
    pub fn prefs_register_bool(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let module = self.check_pref_module(args, 1)?;
        let name = self.arg_str(args, 2)?;
        let title = self.arg_str(args, 3)?;
        let description = self.opt_str(args, 4, "")?;
        let default = self.arg_bool(args, 5)?;
        let cell = self
            .core
            .borrow_mut()
            .prefs
            .register_bool(module, &name, &title, &description, default)
            .ok_or_else(|| ScriptError::runtime("preference module is not registered"))?;
        Ok(vec![self.box_process(NativeObj::Preference(cell))])
    }

    /// `pref:get() -> boolean`: the live value, as last set by the host.
    pub fn pref_get(&mut self, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let cell = self.check_pref(args, 1)?;
        Ok(vec![Value::Bool(cell.get())])
    }
}
