//! Preference registry.
//!
//! Each protocol may register named boolean preferences. The live value is
//! a shared cell: the host's preference UI writes it, dissectors read it on
//! every packet without re-querying the registry.

use std::cell::Cell;
use std::rc::Rc;

use crate::fields::ProtoId;

/// Identifies a protocol's preference module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefModuleId(pub u32);

/// One registered boolean preference.
#[derive(Debug, Clone)]
pub struct Preference {
    pub name: String,
    pub title: String,
    pub description: String,
    pub value: Rc<Cell<bool>>,
}

#[derive(Debug, Default)]
pub struct PrefRegistry {
    modules: Vec<(ProtoId, Vec<Preference>)>,
}

impl PrefRegistry {
    pub fn new() -> Self {
        PrefRegistry::default()
    }

    pub fn register_protocol(&mut self, proto: ProtoId) -> PrefModuleId {
        let id = PrefModuleId(self.modules.len() as u32);
        self.modules.push((proto, Vec::new()));
        id
    }

    /// Registers a boolean preference and returns its shared value cell.
    pub fn register_bool(
        &mut self,
        module: PrefModuleId,
        name: &str,
        title: &str,
        description: &str,
        default: bool,
    ) -> Option<Rc<Cell<bool>>> {
        let value = Rc::new(Cell::new(default));
        let slot = self.modules.get_mut(module.0 as usize)?;
        slot.1.push(Preference {
            name: name.to_owned(),
            title: title.to_owned(),
            description: description.to_owned(),
            value: Rc::clone(&value),
        });
        Some(value)
    }

    pub fn find(&self, module: PrefModuleId, name: &str) -> Option<&Preference> {
        self.modules
            .get(module.0 as usize)?
            .1
            .iter()
            .find(|p| p.name == name)
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_cell_is_shared() {
        let mut reg = PrefRegistry::new();
        let module = reg.register_protocol(ProtoId(0));
        let cell = reg
            .register_bool(module, "verify", "Verify checksums", "", true)
            .unwrap();
        assert!(cell.get());
        reg.find(module, "verify").unwrap().value.set(false);
        assert!(!cell.get());
    }
}
