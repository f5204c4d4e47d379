//! Per-packet metadata and summary columns.

use std::cell::RefCell;
use std::rc::Rc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::addr::Address;

/// Shared handle to one packet's metadata, alive for the duration of a
/// dissection pass.
pub type SharedPinfo = Rc<RefCell<PacketInfo>>;

/// The summary columns a dissector may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ColumnId {
    Protocol = 0,
    Info = 1,
}

/// Text content of the summary columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    protocol: String,
    info: String,
}

impl ColumnInfo {
    fn slot(&mut self, col: ColumnId) -> &mut String {
        match col {
            ColumnId::Protocol => &mut self.protocol,
            ColumnId::Info => &mut self.info,
        }
    }

    pub fn get(&self, col: ColumnId) -> &str {
        match col {
            ColumnId::Protocol => &self.protocol,
            ColumnId::Info => &self.info,
        }
    }

    pub fn set(&mut self, col: ColumnId, text: &str) {
        let slot = self.slot(col);
        slot.clear();
        slot.push_str(text);
    }

    pub fn append(&mut self, col: ColumnId, text: &str) {
        self.slot(col).push_str(text);
    }

    pub fn clear(&mut self, col: ColumnId) {
        self.slot(col).clear();
    }
}

/// Metadata for the packet currently being dissected.
#[derive(Debug, Clone, Default)]
pub struct PacketInfo {
    pub dl_src: Option<Address>,
    pub dl_dst: Option<Address>,
    pub net_src: Option<Address>,
    pub net_dst: Option<Address>,
    pub src: Option<Address>,
    pub dst: Option<Address>,
    pub src_port: u32,
    pub dst_port: u32,
    pub fragmented: bool,
    pub in_error_pkt: bool,
    pub cols: ColumnInfo,
}

impl PacketInfo {
    pub fn new() -> Self {
        PacketInfo::default()
    }

    pub fn shared(self) -> SharedPinfo {
        Rc::new(RefCell::new(self))
    }

    /// Sets the network-layer addresses, which also become the current
    /// top-of-stack addresses.
    pub fn set_net_addr(&mut self, src: Address, dst: Address) {
        self.net_src = Some(src.clone());
        self.net_dst = Some(dst.clone());
        self.src = Some(src);
        self.dst = Some(dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn columns_set_append_clear() {
        let mut cols = ColumnInfo::default();
        cols.set(ColumnId::Protocol, "DEMO");
        cols.append(ColumnId::Info, "len=9");
        cols.append(ColumnId::Info, ", more");
        assert_eq!(cols.get(ColumnId::Protocol), "DEMO");
        assert_eq!(cols.get(ColumnId::Info), "len=9, more");
        cols.clear(ColumnId::Info);
        assert_eq!(cols.get(ColumnId::Info), "");
    }

    #[test]
    fn net_addr_also_sets_current() {
        let mut pinfo = PacketInfo::new();
        let src = Address::Ipv4(Ipv4Addr::new(10, 0, 0, 1));
        let dst = Address::Ipv4(Ipv4Addr::new(10, 0, 0, 2));
        pinfo.set_net_addr(src.clone(), dst.clone());
        assert_eq!(pinfo.src, Some(src));
        assert_eq!(pinfo.net_dst, Some(dst));
    }
}
