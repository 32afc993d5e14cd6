//! GS local memory store
//!
//! [`LocalMemory`] owns the 4 MiB buffer, the palette and the offset caches.
//! Pixel access dispatches on the format descriptor; bulk transfers and
//! texture readback live in the `transfer` and `texture` modules.

use crate::constants::*;
use crate::offset::{GsOffset, Page2TileMap, PixelOffset, PixelOffset4, PixelOffsetKey};
use crate::psm::psm_info;
use crate::regs::{Frame, Tex0, Texa, Zbuf};
use crate::swizzle;
use crate::vram::Vram;
use gsx_core::config::Config;
use gsx_core::error::MemoryError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type Cache<K, V> = RwLock<HashMap<K, Arc<V>>>;

fn cached<K, V>(cache: &Cache<K, V>, key: K, build: impl FnOnce() -> V) -> Arc<V>
where
    K: Eq + Hash + Copy,
{
    if let Some(entry) = cache.read().get(&key) {
        return Arc::clone(entry);
    }

    let mut map = cache.write();
    Arc::clone(map.entry(key).or_insert_with(|| Arc::new(build())))
}

/// GS local memory with its lookup caches
pub struct LocalMemory {
    pub(crate) vram: Vram,
    clut: Box<[u32; CLUT_ENTRIES]>,
    offsets: Cache<u32, GsOffset>,
    pixel_offsets: Cache<PixelOffsetKey, PixelOffset>,
    pixel_offsets4: Cache<PixelOffsetKey, PixelOffset4>,
    page2tile: Cache<u64, Page2TileMap>,
    pub(crate) trace_transfers: bool,
}

impl LocalMemory {
    /// Allocate zeroed local memory
    pub fn new(config: &Config) -> Result<Self, MemoryError> {
        let vram = Vram::new()?;

        if config.memory.prebuild_tables {
            swizzle::prebuild_tables();
        }

        tracing::info!(
            "GS local memory created: {} KB, {} pages",
            VRAM_SIZE / 1024,
            MAX_PAGES
        );

        Ok(Self {
            vram,
            clut: Box::new([0; CLUT_ENTRIES]),
            offsets: RwLock::new(HashMap::new()),
            pixel_offsets: RwLock::new(HashMap::new()),
            pixel_offsets4: RwLock::new(HashMap::new()),
            page2tile: RwLock::new(HashMap::new()),
            trace_transfers: config.debug.trace_transfers,
        })
    }

    /// Backing store
    pub fn vram(&self) -> &Vram {
        &self.vram
    }

    /// Backing store, mutable
    pub fn vram_mut(&mut self) -> &mut Vram {
        &mut self.vram
    }

    /// Palette in 32-bit RGBA
    pub fn clut(&self) -> &[u32; CLUT_ENTRIES] {
        &self.clut
    }

    pub fn clut_mut(&mut self) -> &mut [u32; CLUT_ENTRIES] {
        &mut self.clut
    }

    /// Element address of a pixel
    #[inline]
    pub fn pixel_address(&self, x: u32, y: u32, psm: u32, bp: u32, bw: u32) -> u32 {
        psm_info(psm).pa(x, y, bp, bw)
    }

    /// Read a pixel, widened to 32 bits
    #[inline]
    pub fn read_pixel(&self, x: u32, y: u32, psm: u32, bp: u32, bw: u32) -> u32 {
        let info = psm_info(psm);
        info.access.read(&self.vram, info.pa(x, y, bp, bw))
    }

    /// Write a pixel, keeping the bits of memory the format does not own
    #[inline]
    pub fn write_pixel(&mut self, x: u32, y: u32, c: u32, psm: u32, bp: u32, bw: u32) {
        let info = psm_info(psm);
        info.access.write(&mut self.vram, info.pa(x, y, bp, bw), c);
    }

    /// Read the element at `addr` in the units of `psm`
    #[inline]
    pub fn read_pixel_addr(&self, addr: u32, psm: u32) -> u32 {
        psm_info(psm).access.read(&self.vram, addr)
    }

    #[inline]
    pub fn write_pixel_addr(&mut self, addr: u32, c: u32, psm: u32) {
        psm_info(psm).access.write(&mut self.vram, addr, c);
    }

    /// Read a texel of the texture described by `tex0`, expanded to RGBA
    #[inline]
    pub fn read_texel(&self, x: u32, y: u32, tex0: &Tex0, texa: &Texa) -> u32 {
        let info = psm_info(tex0.psm);
        let addr = info.pa(x, y, tex0.tbp0, tex0.tbw);
        info.access.read_texel(&self.vram, addr, &self.clut[..], texa)
    }

    /// Offset tables for a buffer
    pub fn get_offset(&self, bp: u32, bw: u32, psm: u32) -> Arc<GsOffset> {
        let (bp, bw, psm) = (bp & 0x3fff, bw & 0x3f, psm & 0x3f);
        cached(&self.offsets, GsOffset::hash_of(bp, bw, psm), || {
            tracing::debug!("New offset: bp={:#x} bw={} psm={:#x}", bp, bw, psm);
            GsOffset::new(bp, bw, psm)
        })
    }

    fn pixel_offset_key(frame: &Frame, zbuf: &Zbuf) -> PixelOffsetKey {
        let key = PixelOffsetKey::new(frame, zbuf);
        debug_assert!(
            psm_info(key.fpsm).trbpp > 8 || psm_info(key.zpsm).trbpp > 8,
            "frame {:#x} and depth {:#x} are both palette formats",
            key.fpsm,
            key.zpsm
        );
        key
    }

    /// Combined frame/depth offsets
    pub fn get_pixel_offset(&self, frame: &Frame, zbuf: &Zbuf) -> Arc<PixelOffset> {
        let key = Self::pixel_offset_key(frame, zbuf);
        cached(&self.pixel_offsets, key, || {
            tracing::debug!("New pixel offset: {:?} (hash {:#010x})", key, key.hash());
            PixelOffset::new(key)
        })
    }

    /// Combined frame/depth offsets sampled every fourth column
    pub fn get_pixel_offset4(&self, frame: &Frame, zbuf: &Zbuf) -> Arc<PixelOffset4> {
        let key = Self::pixel_offset_key(frame, zbuf);
        cached(&self.pixel_offsets4, key, || {
            tracing::debug!("New pixel offset4: {:?} (hash {:#010x})", key, key.hash());
            PixelOffset4::new(key)
        })
    }

    /// Page to tile mapping for a texture
    pub fn get_page2tile_map(&self, tex0: &Tex0) -> Arc<Page2TileMap> {
        cached(&self.page2tile, tex0.layout_key(), || {
            let off = self.get_offset(tex0.tbp0, tex0.tbw, tex0.psm);
            tracing::debug!("New page2tile map: {:#011x}", tex0.layout_key());
            Page2TileMap::new(&off, tex0)
        })
    }

    /// Raw little-endian image of local memory
    pub fn snapshot(&self) -> Vec<u8> {
        self.vram.snapshot()
    }

    /// Load an image produced by [`LocalMemory::snapshot`]
    pub fn restore(&mut self, data: &[u8]) -> Result<(), MemoryError> {
        self.vram.restore(data)
    }
}

impl std::fmt::Debug for LocalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMemory")
            .field("offsets", &self.offsets.read().len())
            .field("pixel_offsets", &self.pixel_offsets.read().len())
            .field("pixel_offsets4", &self.pixel_offsets4.read().len())
            .field("page2tile", &self.page2tile.read().len())
            .finish()
    }
}
