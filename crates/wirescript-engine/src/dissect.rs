//! Dissector handles and dispatch tables.
//!
//! A [`DissectorHandle`] is an opaque callable the engine invokes for a
//! matching packet. Handles are filed into named [`DissectorTables`] under
//! integer patterns (a port number, an ethertype). [`DissectorTables::try_uint`]
//! is the dispatch entry point: no match is not an error, it returns zero
//! consumed bytes and leaves the payload for a fallback.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::fault::Fault;
use crate::fields::ProtoId;
use crate::packet::SharedPinfo;
use crate::tree::TreeRef;
use crate::tvb::Tvbuff;

/// The callable form of a dissector: consumes bytes from the buffer,
/// annotates the tree, returns the number of bytes it claimed.
pub type DissectorFn = Rc<dyn Fn(&Tvbuff, &SharedPinfo, &TreeRef) -> Result<usize, Fault>>;

/// A registered dissector.
#[derive(Clone)]
pub struct DissectorHandle {
    pub name: Rc<str>,
    pub proto: ProtoId,
    func: DissectorFn,
}

impl DissectorHandle {
    pub fn call(
        &self,
        tvb: &Tvbuff,
        pinfo: &SharedPinfo,
        tree: &TreeRef,
    ) -> Result<usize, Fault> {
        (self.func)(tvb, pinfo, tree)
    }
}

impl std::fmt::Debug for DissectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DissectorHandle")
            .field("name", &self.name)
            .field("proto", &self.proto)
            .finish_non_exhaustive()
    }
}

/// Named dispatch tables plus the by-name dissector directory.
#[derive(Debug, Default)]
pub struct DissectorTables {
    tables: FxHashMap<String, FxHashMap<u32, DissectorHandle>>,
    by_name: FxHashMap<String, DissectorHandle>,
}

impl DissectorTables {
    pub fn new() -> Self {
        DissectorTables::default()
    }

    /// Creates a dissector handle and files it in the by-name directory.
    pub fn register_dissector(
        &mut self,
        name: &str,
        proto: ProtoId,
        func: DissectorFn,
    ) -> DissectorHandle {
        let handle = DissectorHandle {
            name: Rc::from(name),
            proto,
            func,
        };
        self.by_name.insert(name.to_owned(), handle.clone());
        log::debug!("registered dissector {name}");
        handle
    }

    pub fn find_dissector(&self, name: &str) -> Option<DissectorHandle> {
        self.by_name.get(name).cloned()
    }

    /// Files `handle` under `pattern` in the named table, creating the
    /// table on first use.
    pub fn add_uint(&mut self, table: &str, pattern: u32, handle: DissectorHandle) {
        self.tables
            .entry(table.to_owned())
            .or_default()
            .insert(pattern, handle);
    }

    /// Looks up the handle filed under `pattern`, if any. Callers that
    /// must not hold a borrow of the tables during the call clone the
    /// handle out with this and invoke it themselves.
    pub fn find_uint(&self, table: &str, pattern: u32) -> Option<DissectorHandle> {
        self.tables
            .get(table)
            .and_then(|entries| entries.get(&pattern))
            .cloned()
    }

    /// Dispatches on `pattern`. Returns the consumed length, or zero when
    /// the table or pattern has no entry.
    pub fn try_uint(
        &self,
        table: &str,
        pattern: u32,
        tvb: &Tvbuff,
        pinfo: &SharedPinfo,
        tree: &TreeRef,
    ) -> Result<usize, Fault> {
        let handle = self
            .tables
            .get(table)
            .and_then(|entries| entries.get(&pattern));
        match handle {
            Some(handle) => handle.call(tvb, pinfo, tree),
            None => Ok(0),
        }
    }

    /// The fallback for undissected payload: one text item covering the
    /// remaining bytes. Always consumes the whole buffer.
    pub fn call_data_dissector(tvb: &Tvbuff, tree: &TreeRef) -> usize {
        let len = tvb.captured_length();
        tree.add_text(format!("Data ({len} byte(s))"), 0, len);
        len
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketInfo;
    use crate::tree::ProtoTree;
    use bytes::Bytes;

    fn fixture() -> (Tvbuff, SharedPinfo, TreeRef) {
        (
            Tvbuff::new(Bytes::from_static(&[1, 2, 3])),
            PacketInfo::new().shared(),
            ProtoTree::new(),
        )
    }

    #[test]
    fn try_uint_no_match_consumes_nothing() {
        let tables = DissectorTables::new();
        let (tvb, pinfo, tree) = fixture();
        assert_eq!(tables.try_uint("udp.port", 53, &tvb, &pinfo, &tree).unwrap(), 0);
        assert_eq!(tree.child_count(), 0);
    }

    #[test]
    fn try_uint_dispatches_on_pattern() {
        let mut tables = DissectorTables::new();
        let handle = tables.register_dissector("demo", ProtoId(0), Rc::new(|tvb, _, _| Ok(tvb.captured_length())));
        tables.add_uint("udp.port", 9999, handle);
        let (tvb, pinfo, tree) = fixture();
        assert_eq!(tables.try_uint("udp.port", 9999, &tvb, &pinfo, &tree).unwrap(), 3);
        assert_eq!(tables.try_uint("udp.port", 9998, &tvb, &pinfo, &tree).unwrap(), 0);
    }

    #[test]
    fn data_dissector_consumes_everything() {
        let (tvb, _, tree) = fixture();
        assert_eq!(DissectorTables::call_data_dissector(&tvb, &tree), 3);
        assert_eq!(tree.child_count(), 1);
    }

    #[test]
    fn find_dissector_by_name() {
        let mut tables = DissectorTables::new();
        tables.register_dissector("demo", ProtoId(4), Rc::new(|_, _, _| Ok(0)));
        assert!(tables.find_dissector("demo").is_some());
        assert!(tables.find_dissector("nope").is_none());
    }
}
