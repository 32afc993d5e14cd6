//! Backing store for GS local memory
//!
//! The buffer is held as 32-bit words. Narrower elements are addressed in
//! their own units and located inside a word little-endian first, so a byte
//! view of the buffer sees halfword 0 in bytes 0..2 and nibble 0 in the low
//! half of byte 0.

use crate::constants::*;
use gsx_core::error::MemoryError;

/// 4 MiB of GS local memory
pub struct Vram {
    words: Box<[u32]>,
}

impl Vram {
    /// Allocate zeroed local memory
    pub fn new() -> Result<Self, MemoryError> {
        let mut words: Vec<u32> = Vec::new();
        words
            .try_reserve_exact(VRAM_WORDS)
            .map_err(|_| MemoryError::OutOfMemory { requested: VRAM_SIZE })?;
        words.resize(VRAM_WORDS, 0);

        Ok(Self {
            words: words.into_boxed_slice(),
        })
    }

    /// Read a 32-bit element
    #[inline(always)]
    pub fn read32(&self, addr: u32) -> u32 {
        self.words[(addr & VRAM_WORD_MASK) as usize]
    }

    /// Write a 32-bit element
    #[inline(always)]
    pub fn write32(&mut self, addr: u32, value: u32) {
        self.words[(addr & VRAM_WORD_MASK) as usize] = value;
    }

    /// Replace the bits of a word selected by `mask`
    #[inline(always)]
    pub fn write32_masked(&mut self, addr: u32, value: u32, mask: u32) {
        let word = &mut self.words[(addr & VRAM_WORD_MASK) as usize];
        *word = (*word & !mask) | (value & mask);
    }

    /// Read a 16-bit element
    #[inline(always)]
    pub fn read16(&self, addr: u32) -> u16 {
        let addr = addr & VRAM_HALF_MASK;
        (self.words[(addr >> 1) as usize] >> ((addr & 1) << 4)) as u16
    }

    /// Write a 16-bit element
    #[inline(always)]
    pub fn write16(&mut self, addr: u32, value: u16) {
        let addr = addr & VRAM_HALF_MASK;
        let shift = (addr & 1) << 4;
        let word = &mut self.words[(addr >> 1) as usize];
        *word = (*word & !(0xffff << shift)) | ((value as u32) << shift);
    }

    /// Read an 8-bit element
    #[inline(always)]
    pub fn read8(&self, addr: u32) -> u8 {
        let addr = addr & VRAM_BYTE_MASK;
        (self.words[(addr >> 2) as usize] >> ((addr & 3) << 3)) as u8
    }

    /// Write an 8-bit element
    #[inline(always)]
    pub fn write8(&mut self, addr: u32, value: u8) {
        let addr = addr & VRAM_BYTE_MASK;
        let shift = (addr & 3) << 3;
        let word = &mut self.words[(addr >> 2) as usize];
        *word = (*word & !(0xff << shift)) | ((value as u32) << shift);
    }

    /// Read a 4-bit element (even addresses are the low nibble)
    #[inline(always)]
    pub fn read4(&self, addr: u32) -> u8 {
        let addr = addr & VRAM_NIBBLE_MASK;
        ((self.words[(addr >> 3) as usize] >> ((addr & 7) << 2)) & 0xf) as u8
    }

    /// Write a 4-bit element
    #[inline(always)]
    pub fn write4(&mut self, addr: u32, value: u8) {
        let addr = addr & VRAM_NIBBLE_MASK;
        let shift = (addr & 7) << 2;
        let word = &mut self.words[(addr >> 3) as usize];
        *word = (*word & !(0xf << shift)) | (((value & 0xf) as u32) << shift);
    }

    /// The 64 words of block `bn`
    #[inline]
    pub fn block(&self, bn: u32) -> &[u32] {
        let start = ((bn & BLOCK_MASK) as usize) * (BLOCK_SIZE / 4);
        &self.words[start..start + BLOCK_SIZE / 4]
    }

    /// The 64 words of block `bn`, mutable
    #[inline]
    pub fn block_mut(&mut self, bn: u32) -> &mut [u32] {
        let start = ((bn & BLOCK_MASK) as usize) * (BLOCK_SIZE / 4);
        &mut self.words[start..start + BLOCK_SIZE / 4]
    }

    /// All words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Zero the whole buffer
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Little-endian byte image of the buffer
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VRAM_SIZE);
        for word in self.words.iter() {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Load a byte image produced by [`Vram::snapshot`]
    pub fn restore(&mut self, data: &[u8]) -> Result<(), MemoryError> {
        if data.len() != VRAM_SIZE {
            return Err(MemoryError::SnapshotSize {
                expected: VRAM_SIZE,
                actual: data.len(),
            });
        }

        for (word, bytes) in self.words.iter_mut().zip(data.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Vram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vram").field("size", &VRAM_SIZE).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let vram = Vram::new().unwrap();
        assert_eq!(vram.words().len(), VRAM_WORDS);
        assert!(vram.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_element_views_share_storage() {
        let mut vram = Vram::new().unwrap();
        vram.write32(1, 0x1234_5678);
        assert_eq!(vram.read16(2), 0x5678);
        assert_eq!(vram.read16(3), 0x1234);
        assert_eq!(vram.read8(4), 0x78);
        assert_eq!(vram.read8(7), 0x12);
        assert_eq!(vram.read4(8), 0x8);
        assert_eq!(vram.read4(9), 0x7);
        assert_eq!(vram.read4(15), 0x1);
    }

    #[test]
    fn test_nibble_order() {
        let mut vram = Vram::new().unwrap();
        vram.write4(0, 0xa);
        vram.write4(1, 0x5);
        assert_eq!(vram.read8(0), 0x5a);

        vram.write4(1, 0xc);
        assert_eq!(vram.read8(0), 0xca);
    }

    #[test]
    fn test_narrow_writes_preserve_neighbours() {
        let mut vram = Vram::new().unwrap();
        vram.write32(0, 0xffff_ffff);
        vram.write16(1, 0);
        assert_eq!(vram.read32(0), 0x0000_ffff);
        vram.write8(0, 0x12);
        assert_eq!(vram.read32(0), 0x0000_ff12);
        vram.write32_masked(0, 0xabcd_0000, 0xff00_0000);
        assert_eq!(vram.read32(0), 0xab00_ff12);
    }

    #[test]
    fn test_addresses_wrap() {
        let mut vram = Vram::new().unwrap();
        vram.write32(VRAM_WORDS as u32 + 3, 7);
        assert_eq!(vram.read32(3), 7);
        vram.write4(VRAM_NIBBLE_MASK + 1, 0x9);
        assert_eq!(vram.read4(0), 0x9);
    }

    #[test]
    fn test_block_slices() {
        let mut vram = Vram::new().unwrap();
        vram.block_mut(2)[0] = 42;
        assert_eq!(vram.read32(128), 42);
        assert_eq!(vram.block(2 + MAX_BLOCKS)[0], 42);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut vram = Vram::new().unwrap();
        vram.write32(0, 0x0403_0201);
        let image = vram.snapshot();
        assert_eq!(image.len(), VRAM_SIZE);
        assert_eq!(&image[..4], &[1, 2, 3, 4]);

        let mut other = Vram::new().unwrap();
        other.restore(&image).unwrap();
        assert_eq!(other.read32(0), 0x0403_0201);

        let err = other.restore(&image[..16]).unwrap_err();
        assert_eq!(
            err,
            MemoryError::SnapshotSize {
                expected: VRAM_SIZE,
                actual: 16
            }
        );
    }
}
