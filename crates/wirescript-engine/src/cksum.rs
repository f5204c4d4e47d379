//! Ones'-complement Internet checksum (RFC 1071).

/// Computes the Internet checksum over a sequence of byte ranges, as if
/// they were concatenated. Chunk boundaries may fall on odd offsets; word
/// parity carries across chunks.
pub fn in_cksum(chunks: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut high = true;
    for chunk in chunks {
        for &byte in *chunk {
            if high {
                sum += u32::from(byte) << 8;
            } else {
                sum += u32::from(byte);
            }
            high = !high;
        }
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // Classic RFC 1071 example.
        let data = [0x00u8, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(in_cksum(&[&data]), !0xddf2u16);
    }

    #[test]
    fn split_equals_concatenated() {
        let data = [0x45u8, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40];
        let whole = in_cksum(&[&data]);
        let split = in_cksum(&[&data[..3], &data[3..5], &data[5..]]);
        assert_eq!(whole, split);
    }

    #[test]
    fn verifying_a_packet_with_its_checksum_sums_to_zero() {
        let mut data = vec![0x12u8, 0x34, 0x56, 0x78];
        let ck = in_cksum(&[&data]);
        data.extend_from_slice(&ck.to_be_bytes());
        assert_eq!(in_cksum(&[&data]), 0);
    }
}
