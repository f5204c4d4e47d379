//! The interpreter core and the engine-facing plugin surface.
//!
//! [`Interp`] owns everything with process lifetime: the engine registries,
//! the process handle table, retained script callbacks, the entry-point
//! lists, and the output sink. [`Wirescript`] is the thin plugin object the
//! host drives through the standard lifecycle: `init`, `post_init`,
//! `dissect_init`/`dissect_cleanup` around each packet,
//! `register_all_protocols`/`register_all_handoffs`, and `cleanup`.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use wirescript_engine::{
    DissectorTables, ExpertRegistry, Fault, FieldRegistry, PrefRegistry, SharedPinfo, TreeRef,
    Tvbuff,
};

use crate::ctx::ScriptCtx;
use crate::error::BridgeError;
use crate::handle::{HandleScope, HandleTable};
use crate::value::ScriptFn;

/// Where `print`-style script output goes.
pub type OutputFn = Box<dyn FnMut(&str)>;

// ============================================================================
// Retained callbacks
// ============================================================================

/// Script callables retained for later dispatch, keyed by an opaque id the
/// engine-side closure captures.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    next: u32,
    map: FxHashMap<u32, (String, ScriptFn)>,
}

impl CallbackRegistry {
    pub fn insert(&mut self, name: &str, func: ScriptFn) -> u32 {
        let id = self.next;
        self.next += 1;
        self.map.insert(id, (name.to_owned(), func));
        id
    }

    pub fn get(&self, id: u32) -> Option<(String, ScriptFn)> {
        self.map.get(&id).cloned()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Optional metadata a module declares about itself.
#[derive(Debug, Clone, Default)]
pub struct ScriptInfo {
    pub version: Option<String>,
    pub spdx_id: Option<String>,
    pub home_url: Option<String>,
    pub blurb: Option<String>,
}

/// One loadable script module.
pub struct ScriptModule {
    pub name: String,
    pub file_path: String,
    pub info: Option<ScriptInfo>,
    /// Runs once at load time.
    pub body: Option<ScriptFn>,
    /// Appended to the protocol-registration entry points.
    pub register_protocol: Option<ScriptFn>,
    /// Appended to the handoff-registration entry points.
    pub register_handoff: Option<ScriptFn>,
}

impl ScriptModule {
    pub fn new(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        ScriptModule {
            name: name.into(),
            file_path: file_path.into(),
            info: None,
            body: None,
            register_protocol: None,
            register_handoff: None,
        }
    }
}

/// What [`Wirescript::get_descriptions`] reports per loaded module.
#[derive(Debug, Clone)]
pub struct ModuleDescription {
    pub name: String,
    pub file_path: String,
    pub version: Option<String>,
    pub spdx_id: Option<String>,
    pub home_url: Option<String>,
    pub blurb: Option<String>,
}

/// Produces the modules to load. Filesystem discovery stays host-side;
/// the bridge only consumes the result.
pub trait ModuleLoader {
    /// The reserved bootstrap module, run before everything else. Absence
    /// is normal, not an error.
    fn bootstrap(&mut self) -> Result<Option<ScriptModule>, BridgeError>;

    /// The remaining modules, in no particular order.
    fn modules(&mut self) -> Result<Vec<ScriptModule>, BridgeError>;
}

/// A ready-made loader over an in-memory module list.
#[derive(Default)]
pub struct ModuleSet {
    bootstrap: Option<ScriptModule>,
    modules: Vec<ScriptModule>,
}

impl ModuleSet {
    pub fn new() -> Self {
        ModuleSet::default()
    }

    pub fn with_bootstrap(mut self, module: ScriptModule) -> Self {
        self.bootstrap = Some(module);
        self
    }

    pub fn push(&mut self, module: ScriptModule) {
        self.modules.push(module);
    }
}

impl ModuleLoader for ModuleSet {
    fn bootstrap(&mut self) -> Result<Option<ScriptModule>, BridgeError> {
        Ok(self.bootstrap.take())
    }

    fn modules(&mut self) -> Result<Vec<ScriptModule>, BridgeError> {
        Ok(std::mem::take(&mut self.modules))
    }
}

// ============================================================================
// Core
// ============================================================================

/// Process-lifetime interpreter state.
pub(crate) struct Interp {
    pub fields: FieldRegistry,
    pub tables: DissectorTables,
    pub experts: ExpertRegistry,
    pub prefs: PrefRegistry,
    pub process: HandleTable,
    pub callbacks: CallbackRegistry,
    pub proto_entries: Vec<(String, ScriptFn)>,
    pub handoff_entries: Vec<(String, ScriptFn)>,
    pub descriptions: Vec<ModuleDescription>,
    /// Bound by `dissect_init`, cleared by `dissect_cleanup`.
    pub current_packet: Option<SharedPinfo>,
    pub output: OutputFn,
}

impl Interp {
    fn new() -> Self {
        Interp {
            fields: FieldRegistry::new(),
            tables: DissectorTables::new(),
            experts: ExpertRegistry::new(),
            prefs: PrefRegistry::new(),
            process: HandleTable::new(HandleScope::Process),
            callbacks: CallbackRegistry::default(),
            proto_entries: Vec::new(),
            handoff_entries: Vec::new(),
            descriptions: Vec::new(),
            current_packet: None,
            output: Box::new(|message| log::info!(target: "wirescript", "{message}")),
        }
    }
}

// ============================================================================
// Plugin surface
// ============================================================================

/// The plugin object the host engine drives.
pub struct Wirescript {
    core: Rc<RefCell<Interp>>,
}

impl Default for Wirescript {
    fn default() -> Self {
        Wirescript::new()
    }
}

impl Wirescript {
    pub fn new() -> Self {
        Wirescript {
            core: Rc::new(RefCell::new(Interp::new())),
        }
    }

    /// A fresh execution context with its own per-call handle table. Used
    /// by dispatch, module loading, and host-driven calls alike.
    pub fn ctx(&self) -> ScriptCtx {
        ScriptCtx::new(Rc::clone(&self.core))
    }

    /// Loads the bootstrap module (if any) and then every other module.
    /// Each module's body runs at load; its entry-point callables are
    /// appended, in load order, for the `register_all_*` passes.
    pub fn init(&self, loader: &mut dyn ModuleLoader) -> Result<(), BridgeError> {
        if let Some(bootstrap) = loader.bootstrap()? {
            self.load_module(bootstrap)?;
        }
        for module in loader.modules()? {
            self.load_module(module)?;
        }
        Ok(())
    }

    fn load_module(&self, module: ScriptModule) -> Result<(), BridgeError> {
        log::debug!("loading module {}", module.name);
        if let Some(body) = &module.body {
            let mut ctx = self.ctx();
            ctx.invoke(&module.name, body, &[])?;
        }
        let info = module.info.unwrap_or_default();
        let mut core = self.core.borrow_mut();
        if let Some(func) = module.register_protocol {
            core.proto_entries.push((module.name.clone(), func));
        }
        if let Some(func) = module.register_handoff {
            core.handoff_entries.push((module.name.clone(), func));
        }
        core.descriptions.push(ModuleDescription {
            name: module.name,
            file_path: module.file_path,
            version: info.version,
            spdx_id: info.spdx_id,
            home_url: info.home_url,
            blurb: info.blurb,
        });
        Ok(())
    }

    /// Runs deferred initialization chunks after every module has loaded.
    pub fn post_init(&self, chunks: &[(String, ScriptFn)]) -> Result<(), BridgeError> {
        let mut ctx = self.ctx();
        for (name, func) in chunks {
            ctx.invoke(name, func, &[])?;
        }
        Ok(())
    }

    /// Binds the packet metadata for the dissection pass that is starting.
    pub fn dissect_init(&self, pinfo: SharedPinfo) {
        self.core.borrow_mut().current_packet = Some(pinfo);
    }

    /// Clears the packet binding; script use after this point is a
    /// detectable failure rather than a read of stale metadata.
    pub fn dissect_cleanup(&self) {
        self.core.borrow_mut().current_packet = None;
    }

    fn run_entries(
        &self,
        entries: Vec<(String, ScriptFn)>,
        mut progress: Option<&mut dyn FnMut()>,
    ) -> Result<(), BridgeError> {
        let mut ctx = self.ctx();
        for (name, func) in &entries {
            if let Some(cb) = progress.as_deref_mut() {
                cb();
            }
            ctx.invoke(name, func, &[])?;
        }
        Ok(())
    }

    /// Runs every protocol-registration entry point exactly once, in module
    /// load order, invoking `progress` before each.
    pub fn register_all_protocols(
        &self,
        progress: Option<&mut dyn FnMut()>,
    ) -> Result<(), BridgeError> {
        let entries = self.core.borrow().proto_entries.clone();
        self.run_entries(entries, progress)
    }

    /// Runs every handoff-registration entry point exactly once, in module
    /// load order, invoking `progress` before each.
    pub fn register_all_handoffs(
        &self,
        progress: Option<&mut dyn FnMut()>,
    ) -> Result<(), BridgeError> {
        let entries = self.core.borrow().handoff_entries.clone();
        self.run_entries(entries, progress)
    }

    /// Reports each loaded module's description, in load order.
    pub fn get_descriptions(&self, visit: &mut dyn FnMut(&ModuleDescription)) {
        for description in &self.core.borrow().descriptions {
            visit(description);
        }
    }

    /// Engine-facing dispatch into a named table. The handle is cloned out
    /// of the core before the call so the dissector can reenter the
    /// interpreter.
    pub fn try_dissect(
        &self,
        table: &str,
        pattern: u32,
        tvb: &Tvbuff,
        pinfo: &SharedPinfo,
        tree: &TreeRef,
    ) -> Result<usize, Fault> {
        let handle = self.core.borrow().tables.find_uint(table, pattern);
        match handle {
            Some(handle) => handle.call(tvb, pinfo, tree),
            None => Ok(0),
        }
    }

    /// Swaps the output sink, returning a guard that restores the previous
    /// sink when dropped. Substitutions nest and unwind correctly even
    /// when an inner call fails.
    pub fn swap_output(&self, sink: OutputFn) -> OutputGuard {
        let prev = std::mem::replace(&mut self.core.borrow_mut().output, sink);
        OutputGuard {
            core: Rc::clone(&self.core),
            prev: Some(prev),
        }
    }

    /// Drops every registration and retained callback. Outstanding process
    /// handles become stale rather than dangling.
    pub fn cleanup(&self) {
        let mut core = self.core.borrow_mut();
        core.fields.clear();
        core.tables.clear();
        core.experts.clear();
        core.prefs.clear();
        core.process.clear();
        core.callbacks.clear();
        core.proto_entries.clear();
        core.handoff_entries.clear();
        core.descriptions.clear();
        core.current_packet = None;
    }
}

/// Restores the previous output sink on drop.
pub struct OutputGuard {
    core: Rc<RefCell<Interp>>,
    prev: Option<OutputFn>,
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            self.core.borrow_mut().output = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use crate::value::Value;
    use std::cell::RefCell as StdRefCell;

    fn counting_module(name: &str, order: Rc<StdRefCell<Vec<String>>>) -> ScriptModule {
        let mut module = ScriptModule::new(name, format!("/modules/{name}.ws"));
        let tag = name.to_owned();
        let order_proto = Rc::clone(&order);
        module.register_protocol = Some(Rc::new(move |_, _| {
            order_proto.borrow_mut().push(format!("proto:{tag}"));
            Ok(vec![])
        }));
        let tag = name.to_owned();
        module.register_handoff = Some(Rc::new(move |_, _| {
            order.borrow_mut().push(format!("handoff:{tag}"));
            Ok(vec![])
        }));
        module
    }

    #[test]
    fn entry_points_run_once_in_load_order_with_progress() {
        let plugin = Wirescript::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));
        let mut set = ModuleSet::new();
        set.push(counting_module("alpha", Rc::clone(&order)));
        set.push(counting_module("beta", Rc::clone(&order)));
        plugin.init(&mut set).unwrap();

        // The progress callback fires once per module, before its entry
        // point runs, so the ticks interleave with the entries.
        let order_tick = Rc::clone(&order);
        plugin
            .register_all_protocols(Some(&mut || {
                order_tick.borrow_mut().push("tick".to_owned());
            }))
            .unwrap();
        plugin.register_all_handoffs(None).unwrap();

        assert_eq!(
            *order.borrow(),
            ["tick", "proto:alpha", "tick", "proto:beta", "handoff:alpha", "handoff:beta"]
        );
    }

    #[test]
    fn bootstrap_runs_before_other_modules() {
        let plugin = Wirescript::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));
        let mut boot = ScriptModule::new("bootstrap", "/modules/bootstrap.ws");
        let order_boot = Rc::clone(&order);
        boot.body = Some(Rc::new(move |_, _| {
            order_boot.borrow_mut().push("bootstrap".to_owned());
            Ok(vec![])
        }));
        let mut module = ScriptModule::new("demo", "/modules/demo.ws");
        let order_body = Rc::clone(&order);
        module.body = Some(Rc::new(move |_, _| {
            order_body.borrow_mut().push("demo".to_owned());
            Ok(vec![])
        }));
        let mut set = ModuleSet::new().with_bootstrap(boot);
        set.push(module);
        plugin.init(&mut set).unwrap();
        assert_eq!(*order.borrow(), ["bootstrap", "demo"]);
    }

    #[test]
    fn missing_bootstrap_is_not_an_error() {
        let plugin = Wirescript::new();
        let mut set = ModuleSet::new();
        assert!(plugin.init(&mut set).is_ok());
    }

    #[test]
    fn entry_point_failure_stops_the_pass() {
        let plugin = Wirescript::new();
        let mut module = ScriptModule::new("bad", "/modules/bad.ws");
        module.register_protocol = Some(Rc::new(|_, _| Err(ScriptError::runtime("nope"))));
        let mut set = ModuleSet::new();
        set.push(module);
        plugin.init(&mut set).unwrap();
        let err = plugin.register_all_protocols(None).unwrap_err();
        assert!(matches!(err, BridgeError::Call(_)));
    }

    #[test]
    fn descriptions_round_trip_script_info() {
        let plugin = Wirescript::new();
        let mut module = ScriptModule::new("demo", "/modules/demo.ws");
        module.info = Some(ScriptInfo {
            version: Some("1.2".into()),
            spdx_id: Some("MIT".into()),
            home_url: Some("https://example.net/demo".into()),
            blurb: Some("demo protocol".into()),
        });
        let mut set = ModuleSet::new();
        set.push(module);
        plugin.init(&mut set).unwrap();

        let mut seen = Vec::new();
        plugin.get_descriptions(&mut |d| seen.push(d.clone()));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "demo");
        assert_eq!(seen[0].version.as_deref(), Some("1.2"));
        assert_eq!(seen[0].spdx_id.as_deref(), Some("MIT"));
        assert_eq!(seen[0].file_path, "/modules/demo.ws");
    }

    #[test]
    fn output_guard_restores_on_drop() {
        let plugin = Wirescript::new();
        let captured = Rc::new(StdRefCell::new(Vec::<String>::new()));
        {
            let captured = Rc::clone(&captured);
            let _guard = plugin.swap_output(Box::new(move |msg| {
                captured.borrow_mut().push(msg.to_owned());
            }));
            plugin.ctx().print("inside");
        }
        // Guard dropped; the default sink is back and nothing is captured.
        plugin.ctx().print("outside");
        assert_eq!(*captured.borrow(), ["inside"]);
    }

    #[test]
    fn output_guards_nest_through_failures() {
        let plugin = Wirescript::new();
        let outer = Rc::new(StdRefCell::new(Vec::<String>::new()));
        let inner = Rc::new(StdRefCell::new(Vec::<String>::new()));
        let outer_sink = Rc::clone(&outer);
        let _outer_guard = plugin.swap_output(Box::new(move |msg| {
            outer_sink.borrow_mut().push(msg.to_owned());
        }));
        {
            let inner_sink = Rc::clone(&inner);
            let _inner_guard = plugin.swap_output(Box::new(move |msg| {
                inner_sink.borrow_mut().push(msg.to_owned());
            }));
            let mut ctx = plugin.ctx();
            let failing: crate::value::ScriptFn = Rc::new(|ctx, _| {
                ctx.print("from failing callable");
                Err(ScriptError::runtime("fail"))
            });
            assert!(ctx.invoke("failing", &failing, &[]).is_err());
        }
        plugin.ctx().print("after");
        assert_eq!(*inner.borrow(), ["from failing callable"]);
        assert_eq!(*outer.borrow(), ["after"]);
    }

    #[test]
    fn cleanup_clears_registrations() {
        let plugin = Wirescript::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));
        let mut set = ModuleSet::new();
        set.push(counting_module("alpha", Rc::clone(&order)));
        plugin.init(&mut set).unwrap();
        plugin.cleanup();
        plugin.register_all_protocols(None).unwrap();
        assert!(order.borrow().is_empty());
        let mut count = 0;
        plugin.get_descriptions(&mut |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn post_init_runs_chunks_in_order() {
        let plugin = Wirescript::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));
        let a = Rc::clone(&order);
        let b = Rc::clone(&order);
        let chunks: Vec<(String, crate::value::ScriptFn)> = vec![
            (
                "first".into(),
                Rc::new(move |_, _| {
                    a.borrow_mut().push(1);
                    Ok(vec![Value::Nil])
                }),
            ),
            (
                "second".into(),
                Rc::new(move |_, _| {
                    b.borrow_mut().push(2);
                    Ok(vec![])
                }),
            ),
        ];
        plugin.post_init(&chunks).unwrap();
        assert_eq!(*order.borrow(), [1, 2]);
    }
}
