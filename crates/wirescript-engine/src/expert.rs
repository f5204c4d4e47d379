//! Expert-info registry.
//!
//! Expert entries are registered per protocol module before dissection and
//! attached to tree items during it.

/// Identifies an expert-info module (one per protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpertModuleId(pub u32);

/// Identifies a registered expert-info entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpertId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpertGroup {
    Checksum,
    Malformed,
    Protocol,
    Undecoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpertSeverity {
    Comment,
    Note,
    Warn,
    Error,
}

/// One registered expert-info entry.
#[derive(Debug, Clone)]
pub struct ExpertInfo {
    /// Filter name ("demo.checksum.bad").
    pub name: String,
    pub group: ExpertGroup,
    pub severity: ExpertSeverity,
    /// Default summary shown when no per-occurrence message is given.
    pub summary: String,
}

use crate::fields::ProtoId;

#[derive(Debug, Default)]
pub struct ExpertRegistry {
    modules: Vec<ProtoId>,
    entries: Vec<(ExpertModuleId, ExpertInfo)>,
}

impl ExpertRegistry {
    pub fn new() -> Self {
        ExpertRegistry::default()
    }

    pub fn register_protocol(&mut self, proto: ProtoId) -> ExpertModuleId {
        let id = ExpertModuleId(self.modules.len() as u32);
        self.modules.push(proto);
        id
    }

    pub fn register_info(&mut self, module: ExpertModuleId, info: ExpertInfo) -> ExpertId {
        let id = ExpertId(self.entries.len() as u32);
        self.entries.push((module, info));
        id
    }

    pub fn info(&self, id: ExpertId) -> Option<&ExpertInfo> {
        self.entries.get(id.0 as usize).map(|(_, info)| info)
    }

    pub fn module_protocol(&self, id: ExpertModuleId) -> Option<ProtoId> {
        self.modules.get(id.0 as usize).copied()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_look_up() {
        let mut reg = ExpertRegistry::new();
        let module = reg.register_protocol(ProtoId(0));
        let id = reg.register_info(
            module,
            ExpertInfo {
                name: "t.bad".into(),
                group: ExpertGroup::Checksum,
                severity: ExpertSeverity::Error,
                summary: "Bad checksum".into(),
            },
        );
        assert_eq!(reg.info(id).map(|i| i.summary.as_str()), Some("Bad checksum"));
        assert_eq!(reg.module_protocol(module), Some(ProtoId(0)));
    }
}
