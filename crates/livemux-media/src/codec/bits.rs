//! Bit-level reader and writer for codec configuration payloads.

/// Remove emulation prevention bytes (0x03) from a NAL unit payload.
///
/// The byte sequence 0x00 0x00 0x03 is used to prevent start code
/// emulation; the 0x03 is dropped.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            result.push(0);
            result.push(0);
            i += 3;
        } else {
            result.push(data[i]);
            i += 1;
        }
    }

    result
}

/// MSB-first bit reader. Every read returns `None` once the data runs out.
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read n bits (up to 32).
    pub fn read_bits(&mut self, n: u8) -> Option<u32> {
        let mut result = 0u32;

        for _ in 0..n {
            if self.byte_pos >= self.data.len() {
                return None;
            }

            let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
            result = (result << 1) | (bit as u32);

            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
        }

        Some(result)
    }

    pub fn read_flag(&mut self) -> Option<bool> {
        self.read_bits(1).map(|b| b == 1)
    }

    /// Read unsigned Exp-Golomb coded value.
    pub fn read_ue(&mut self) -> Option<u32> {
        let mut leading_zeros = 0u8;
        loop {
            let bit = self.read_bits(1)?;
            if bit == 1 {
                break;
            }
            leading_zeros += 1;
            if leading_zeros > 31 {
                return None;
            }
        }

        if leading_zeros == 0 {
            return Some(0);
        }

        let suffix = self.read_bits(leading_zeros)?;
        Some((1u32 << leading_zeros) - 1 + suffix)
    }

    /// Read signed Exp-Golomb coded value.
    pub fn read_se(&mut self) -> Option<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i32;
        if code % 2 == 1 {
            Some(magnitude)
        } else {
            Some(-magnitude)
        }
    }
}

/// MSB-first bit writer, used for AudioSpecificConfig.
#[derive(Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the low `n` bits of `value` (up to 32).
    pub fn write_bits(&mut self, value: u32, n: u8) {
        for i in (0..n).rev() {
            if self.bit_pos == 0 {
                self.data.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.data.last_mut() {
                *last |= bit << (7 - self.bit_pos);
            }
            self.bit_pos = (self.bit_pos + 1) % 8;
        }
    }

    pub fn write_ue(&mut self, value: u32) {
        let code = value + 1;
        let len = 32 - code.leading_zeros() as u8;
        self.write_bits(0, len - 1);
        self.write_bits(code, len);
    }

    /// Finish, zero-padding the last byte.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bits_msb_first() {
        let data = [0b10110100, 0b01010101];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(4), Some(0b1011));
        assert_eq!(reader.read_bits(4), Some(0b0100));
        assert_eq!(reader.read_bits(8), Some(0b01010101));
        assert_eq!(reader.read_bits(1), None);
    }

    #[test]
    fn read_ue_values() {
        // 1 -> 0, 010 -> 1, 011 -> 2, 00100 -> 3
        let data = [0b10100110, 0b01000000];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_ue(), Some(0));
        assert_eq!(reader.read_ue(), Some(1));
        assert_eq!(reader.read_ue(), Some(2));
        assert_eq!(reader.read_ue(), Some(3));
    }

    #[test]
    fn read_se_values() {
        // 010 -> +1, 011 -> -1, 00100 -> +2
        let data = [0b01001100, 0b10000000];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_se(), Some(1));
        assert_eq!(reader.read_se(), Some(-1));
        assert_eq!(reader.read_se(), Some(2));
    }

    #[test]
    fn emulation_prevention_removed() {
        let input = vec![0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x02];
        let output = remove_emulation_prevention(&input);
        assert_eq!(output, vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn writer_round_trips_through_reader() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        w.write_ue(4);
        w.write_bits(0xABCD, 16);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(3), Some(0b101));
        assert_eq!(r.read_ue(), Some(4));
        assert_eq!(r.read_bits(16), Some(0xABCD));
    }

    #[test]
    fn writer_pads_last_byte() {
        let mut w = BitWriter::new();
        w.write_bits(0b1, 1);
        assert_eq!(w.into_bytes(), vec![0x80]);
    }
}
