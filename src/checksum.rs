/*
 * Checksum computation for the three supported protocols
 *
 * All calculators share the same shape: feed bytes with add(), then
 * compare against the transmitted value with matches().
 */

/// u-blox Fletcher-8 pair, accumulated over class, id, length and payload.
#[derive(Debug, Default)]
pub struct Checksum {
    cka: u8,
    ckb: u8,
}

impl Checksum {
    pub fn new() -> Self {
        Self { cka: 0, ckb: 0 }
    }

    pub fn value(&self) -> (u8, u8) {
        (self.cka, self.ckb)
    }

    pub fn matches(&self, cka: u8, ckb: u8) -> bool {
        self.cka == cka && self.ckb == ckb
    }

    pub fn reset(&mut self) {
        self.cka = 0;
        self.ckb = 0;
    }

    pub fn add(&mut self, byte: u8) {
        self.cka = self.cka.wrapping_add(byte);
        self.ckb = self.ckb.wrapping_add(self.cka);
    }

    pub fn add_all(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.add(*byte);
        }
    }
}

/// SiRF payload sum, folded into 15 bits after every byte.
#[derive(Debug, Default)]
pub struct SirfChecksum {
    csum: u16,
}

impl SirfChecksum {
    pub fn new() -> Self {
        Self { csum: 0 }
    }

    pub fn value(&self) -> u16 {
        self.csum
    }

    pub fn matches(&self, csum: u16) -> bool {
        self.csum == csum
    }

    pub fn reset(&mut self) {
        self.csum = 0;
    }

    pub fn add(&mut self, byte: u8) {
        self.csum = 0x7FFF & (self.csum + byte as u16);
    }

    pub fn add_all(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.add(*byte);
        }
    }
}

/// NMEA XOR over the low 7 bits of every byte between '$' and '*'.
#[derive(Debug, Default)]
pub struct NmeaChecksum {
    csum: u8,
}

impl NmeaChecksum {
    pub fn new() -> Self {
        Self { csum: 0 }
    }

    pub fn value(&self) -> u8 {
        self.csum
    }

    pub fn matches(&self, csum: u8) -> bool {
        self.csum == csum
    }

    pub fn reset(&mut self) {
        self.csum = 0;
    }

    pub fn add(&mut self, byte: u8) {
        self.csum ^= byte & 0x7F;
    }

    pub fn add_all(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.add(*byte);
        }
    }
}
