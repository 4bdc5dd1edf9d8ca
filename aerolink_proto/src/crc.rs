//! CRC-16 protecting datagram contents.
//!
//! Reflected CCITT polynomial (`0x8408`), seeded with `0xFFFF`, no final XOR. This parameter
//! set is usually catalogued as CRC-16/MCRF4XX.

const POLY_REFLECTED: u16 = 0x8408;

/// Initial register value.
pub const INIT: u16 = 0xFFFF;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0; 256];
    let mut i = 0;

    while i < table.len() {
        let mut crc = i as u16;
        let mut bit = 0;

        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Incremental CRC-16 computation.
///
/// Feeding the input in several [`update`](Self::update) calls yields the same result as
/// feeding it all at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crc16 {
    state: u16,
}

impl Default for Crc16 {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    #[inline(always)]
    pub const fn new() -> Self {
        Self { state: INIT }
    }

    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let idx = (self.state ^ u16::from(byte)) & 0xFF;
            self.state = (self.state >> 8) ^ TABLE[usize::from(idx)];
        }
    }

    #[inline(always)]
    pub const fn finish(&self) -> u16 {
        self.state
    }
}

/// One-shot CRC of `bytes`.
#[inline]
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0x6F91);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(checksum(&[]), INIT);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";

        let mut crc = Crc16::new();
        for chunk in data.chunks(7) {
            crc.update(chunk);
        }

        assert_eq!(crc.finish(), checksum(data));
    }
}
