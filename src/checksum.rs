#![deny(missing_docs)]

use std::num::Wrapping;

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// Data that does not end on a 32-bit boundary is treated as if it were padded with zeros, which
/// is how the table will be laid out once written.
///
/// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums
pub fn table_checksum(data: &[u8]) -> Wrapping<u32> {
    data.chunks(4)
        .map(|chunk| {
            let mut word = [0; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            Wrapping(u32::from_be_bytes(word))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_checksum() {
        let data = [0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4];

        assert_eq!(table_checksum(&data), Wrapping(10));
    }

    #[test]
    fn test_table_checksum_overflow() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 2];

        assert_eq!(table_checksum(&data), Wrapping(1));
    }

    #[test]
    fn test_table_checksum_unaligned() {
        assert_eq!(table_checksum(&[0, 0, 1]), Wrapping(0x100));
    }
}
