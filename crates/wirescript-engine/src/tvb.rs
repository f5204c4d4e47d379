//! Bounds-checked packet buffers.
//!
//! A [`Tvbuff`] wraps the captured bytes of (part of) a packet together with
//! the length the packet claimed on the wire. Every accessor validates the
//! requested range against the captured data and returns [`Fault::Bounds`]
//! instead of panicking, so a truncated capture can never take the process
//! down.
//!
//! Buffers are cheap to clone and to slice: the payload is a [`Bytes`]
//! handle, so `subset_remaining` shares storage with its parent.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

use crate::fault::Fault;

/// An immutable, bounds-checked view of packet data.
#[derive(Debug, Clone)]
pub struct Tvbuff {
    data: Bytes,
    reported_len: usize,
}

impl Tvbuff {
    /// Wraps fully captured data (reported length equals captured length).
    pub fn new(data: Bytes) -> Self {
        let reported_len = data.len();
        Tvbuff { data, reported_len }
    }

    /// Wraps data for which the wire claimed `reported_len` bytes. The
    /// captured slice may be shorter than the claim (a truncated capture).
    pub fn from_data(data: Bytes, reported_len: usize) -> Self {
        Tvbuff { data, reported_len }
    }

    /// Number of bytes actually captured.
    pub fn captured_length(&self) -> usize {
        self.data.len()
    }

    /// Captured bytes remaining at `offset`, zero if past the end.
    pub fn captured_length_remaining(&self, offset: usize) -> usize {
        self.data.len().saturating_sub(offset)
    }

    /// Number of bytes the packet claimed on the wire.
    pub fn reported_length(&self) -> usize {
        self.reported_len
    }

    fn ensure(&self, offset: usize, want: usize) -> Result<(), Fault> {
        let end = offset.checked_add(want);
        match end {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(Fault::Bounds {
                offset,
                want,
                have: self.data.len(),
            }),
        }
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8, Fault> {
        self.ensure(offset, 1)?;
        Ok(self.data[offset])
    }

    /// Network-order (big-endian) 16-bit read.
    pub fn get_ntohs(&self, offset: usize) -> Result<u16, Fault> {
        self.ensure(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Network-order 32-bit read.
    pub fn get_ntohl(&self, offset: usize) -> Result<u32, Fault> {
        self.ensure(offset, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        Ok(u32::from_be_bytes(raw))
    }

    /// Unsigned integer of `len` bytes (1..=8) with the given byte order.
    pub fn get_uint(&self, offset: usize, len: usize, little_endian: bool) -> Result<u64, Fault> {
        debug_assert!((1..=8).contains(&len));
        self.ensure(offset, len)?;
        let raw = &self.data[offset..offset + len];
        let mut value: u64 = 0;
        if little_endian {
            for &b in raw.iter().rev() {
                value = (value << 8) | u64::from(b);
            }
        } else {
            for &b in raw {
                value = (value << 8) | u64::from(b);
            }
        }
        Ok(value)
    }

    pub fn get_ipv4(&self, offset: usize) -> Result<Ipv4Addr, Fault> {
        self.ensure(offset, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        Ok(Ipv4Addr::from(raw))
    }

    pub fn get_ipv6(&self, offset: usize) -> Result<Ipv6Addr, Fault> {
        self.ensure(offset, 16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.data[offset..offset + 16]);
        Ok(Ipv6Addr::from(raw))
    }

    /// Copy-free byte range. `len` of `None` means "everything from `offset`
    /// to the end of the captured data".
    pub fn get_bytes(&self, offset: usize, len: Option<usize>) -> Result<Bytes, Fault> {
        let len = match len {
            Some(len) => len,
            None => self.captured_length_remaining(offset),
        };
        self.ensure(offset, len)?;
        Ok(self.data.slice(offset..offset + len))
    }

    /// A child buffer covering everything from `offset` onward. Shares
    /// storage with `self`; the reported length shrinks accordingly.
    pub fn subset_remaining(&self, offset: usize) -> Result<Tvbuff, Fault> {
        self.ensure(offset, 0)?;
        Ok(Tvbuff {
            data: self.data.slice(offset..),
            reported_len: self.reported_len.saturating_sub(offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tvb(bytes: &[u8]) -> Tvbuff {
        Tvbuff::new(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn reads_are_bounds_checked() {
        let t = tvb(&[0xab, 0xcd]);
        assert_eq!(t.get_u8(1).unwrap(), 0xcd);
        assert_eq!(t.get_ntohs(0).unwrap(), 0xabcd);
        assert!(matches!(t.get_u8(2), Err(Fault::Bounds { offset: 2, .. })));
        assert!(matches!(t.get_ntohs(1), Err(Fault::Bounds { .. })));
    }

    #[test]
    fn uint_honors_byte_order() {
        let t = tvb(&[0x01, 0x02, 0x03]);
        assert_eq!(t.get_uint(0, 3, false).unwrap(), 0x010203);
        assert_eq!(t.get_uint(0, 3, true).unwrap(), 0x030201);
    }

    #[test]
    fn offset_overflow_is_a_fault() {
        let t = tvb(&[0x00]);
        assert!(t.get_uint(usize::MAX, 2, false).is_err());
    }

    #[test]
    fn subset_shares_and_shrinks() {
        let t = Tvbuff::from_data(Bytes::from_static(&[1, 2, 3, 4]), 10);
        let sub = t.subset_remaining(1).unwrap();
        assert_eq!(sub.captured_length(), 3);
        assert_eq!(sub.reported_length(), 9);
        assert_eq!(sub.get_u8(0).unwrap(), 2);
        assert!(t.subset_remaining(5).is_err());
    }

    #[test]
    fn get_bytes_remaining() {
        let t = tvb(&[9, 8, 7]);
        assert_eq!(t.get_bytes(1, None).unwrap().as_ref(), &[8, 7]);
        assert!(t.get_bytes(1, Some(3)).is_err());
    }
}
