//! scratch: disk-backed character array used by file riders.
//!
//! Layout on disk: one u32 LE scalar value per char, no header. Files are private
//! process-local temporaries named `spool-<pid>-<rand>.scratch` and removed on dispose/Drop.
//!
//! Caching:
//! - a small PagePool (default 4 × 2048 chars) fronts every read and write;
//! - a miss binds the round-robin victim slot, flushing it first when dirty;
//! - logical length is tracked in memory and may run ahead of the physical file
//!   until dirty pages are flushed.
//!
//! purge() resets the logical length and drops page bindings without truncating the file.

mod page;

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::consts::{CHAR_BYTES, SCRATCH_EXT, SCRATCH_PREFIX};
use crate::metrics::{
    record_page_eviction, record_page_flush, record_page_hit, record_page_miss,
    record_scratch_created, record_scratch_disposed,
};

use self::page::PagePool;

pub struct ScratchFile {
    path: PathBuf,
    file: Option<File>,
    pool: PagePool,
    /// Logical length in chars.
    length: u64,
}

impl ScratchFile {
    /// Create a fresh scratch file inside `dir`.
    pub fn create(dir: &Path, pages: usize, page_chars: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create scratch dir {}", dir.display()))?;
        let name = format!(
            "{}{}-{:016x}.{}",
            SCRATCH_PREFIX,
            std::process::id(),
            rand::random::<u64>(),
            SCRATCH_EXT
        );
        let path = dir.join(name);
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("create scratch {}", path.display()))?;

        // Advisory only; some filesystems do not support it.
        if let Err(e) = file.try_lock_exclusive() {
            debug!("scratch: lock {} skipped: {}", path.display(), e);
        }

        record_scratch_created();
        debug!("scratch: created {}", path.display());

        Ok(Self {
            path,
            file: Some(file),
            pool: PagePool::new(pages, page_chars),
            length: 0,
        })
    }

    /// Logical length in chars.
    #[inline]
    pub fn len(&self) -> u64 {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_disposed(&self) -> bool {
        self.file.is_none()
    }

    /// Read up to `out.len()` chars starting at `pos`. Returns how many were read;
    /// fewer than requested means the end of the file was reached.
    pub fn read_chars(&mut self, pos: u64, out: &mut [char]) -> Result<usize> {
        if pos >= self.length || out.is_empty() {
            return Ok(0);
        }
        let avail = (self.length - pos).min(out.len() as u64) as usize;
        let pc = self.pool.page_chars() as u64;

        let mut done = 0usize;
        while done < avail {
            let at = pos + done as u64;
            let number = at / pc;
            let in_page = (at % pc) as usize;
            let n = (avail - done).min(pc as usize - in_page);
            let slot = self.page_for(number)?;
            let page = self.pool.slot(slot);
            out[done..done + n].copy_from_slice(&page.buf[in_page..in_page + n]);
            done += n;
        }
        Ok(done)
    }

    /// Write `src` at `pos`, extending the logical length when writing past the end.
    /// Writes must not leave holes: `pos <= len()`.
    pub fn write_chars(&mut self, pos: u64, src: &[char]) -> Result<()> {
        assert!(
            pos <= self.length,
            "scratch write at {} leaves a hole (len={})",
            pos,
            self.length
        );
        if self.file.is_none() {
            return Err(anyhow!("scratch {} already disposed", self.path.display()));
        }
        let pc = self.pool.page_chars() as u64;

        let mut done = 0usize;
        while done < src.len() {
            let at = pos + done as u64;
            let number = at / pc;
            let in_page = (at % pc) as usize;
            let n = (src.len() - done).min(pc as usize - in_page);
            let slot = self.page_for(number)?;
            let page = self.pool.slot_mut(slot);
            page.buf[in_page..in_page + n].copy_from_slice(&src[done..done + n]);
            page.dirty = true;
            done += n;
            self.length = self.length.max(at + n as u64);
        }
        Ok(())
    }

    /// Append `src` at the current end. Returns the offset it was written at.
    pub fn append(&mut self, src: &[char]) -> Result<u64> {
        let at = self.length;
        self.write_chars(at, src)?;
        Ok(at)
    }

    /// Flush every dirty page to disk.
    pub fn flush(&mut self) -> Result<()> {
        for slot in self.pool.dirty_slots() {
            self.flush_slot(slot)?;
        }
        if let Some(f) = self.file.as_mut() {
            f.flush()
                .with_context(|| format!("flush scratch {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Cheap clear: logical length back to 0, cached pages forgotten, file left as is.
    pub fn purge(&mut self) {
        self.length = 0;
        self.pool.invalidate_all();
    }

    /// Flush, close and remove the file. Idempotent.
    pub fn dispose(&mut self) {
        if self.file.is_none() {
            return;
        }
        if let Err(e) = self.flush() {
            debug!("scratch: flush before dispose failed: {:#}", e);
        }
        if let Some(f) = self.file.take() {
            let _ = f.unlock();
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("scratch: removed {}", self.path.display()),
            Err(e) => debug!("scratch: remove {} failed: {}", self.path.display(), e),
        }
        record_scratch_disposed();
    }

    // ---------------- internal helpers ----------------

    /// Slot holding page `number`, loading it on a miss.
    fn page_for(&mut self, number: u64) -> Result<usize> {
        if let Some(slot) = self.pool.lookup(number) {
            record_page_hit();
            return Ok(slot);
        }
        record_page_miss();

        let slot = self.pool.victim();
        if self.pool.slot(slot).number.is_some() {
            record_page_eviction();
            if self.pool.slot(slot).dirty {
                self.flush_slot(slot)?;
            }
        }
        self.load_slot(slot, number)?;
        Ok(slot)
    }

    /// Bind `slot` to page `number` and fill it from disk (short files leave the tail as is).
    fn load_slot(&mut self, slot: usize, number: u64) -> Result<()> {
        let pc = self.pool.page_chars();
        let f = self
            .file
            .as_mut()
            .ok_or_else(|| anyhow!("scratch {} already disposed", self.path.display()))?;

        let mut raw = vec![0u8; pc * CHAR_BYTES as usize];
        f.seek(SeekFrom::Start(number * pc as u64 * CHAR_BYTES))
            .with_context(|| format!("seek scratch {}", self.path.display()))?;
        let mut got = 0usize;
        while got < raw.len() {
            let n = f
                .read(&mut raw[got..])
                .with_context(|| format!("read scratch {}", self.path.display()))?;
            if n == 0 {
                break;
            }
            got += n;
        }

        // Everything below the logical length that is not cached must be on disk.
        let need = self
            .length
            .saturating_sub(number * pc as u64)
            .min(pc as u64) as usize;
        let have = got / CHAR_BYTES as usize;
        if have < need {
            return Err(anyhow!(
                "scratch {} page {}: {} of {} chars on disk",
                self.path.display(),
                number,
                have,
                need
            ));
        }

        let page = self.pool.slot_mut(slot);
        for (i, c) in page.buf.iter_mut().enumerate().take(got / CHAR_BYTES as usize) {
            let v = LittleEndian::read_u32(&raw[i * 4..i * 4 + 4]);
            *c = char::from_u32(v).unwrap_or(char::REPLACEMENT_CHARACTER);
        }
        page.number = Some(number);
        page.dirty = false;
        Ok(())
    }

    /// Write the valid prefix of a dirty slot back to disk.
    fn flush_slot(&mut self, slot: usize) -> Result<()> {
        let pc = self.pool.page_chars() as u64;
        let length = self.length;
        let page = self.pool.slot(slot);
        let number = match page.number {
            Some(n) => n,
            None => return Ok(()),
        };
        let start = number * pc;
        let valid = length.saturating_sub(start).min(pc) as usize;

        let mut raw = vec![0u8; valid * CHAR_BYTES as usize];
        for (i, c) in page.buf[..valid].iter().enumerate() {
            LittleEndian::write_u32(&mut raw[i * 4..i * 4 + 4], *c as u32);
        }

        let f = self
            .file
            .as_mut()
            .ok_or_else(|| anyhow!("scratch {} already disposed", self.path.display()))?;
        f.seek(SeekFrom::Start(start * CHAR_BYTES))
            .with_context(|| format!("seek scratch {}", self.path.display()))?;
        f.write_all(&raw)
            .with_context(|| format!("write scratch {}", self.path.display()))?;

        self.pool.slot_mut(slot).dirty = false;
        record_page_flush();
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchFile")
            .field("path", &self.path)
            .field("length", &self.length)
            .field("pages", &self.pool.len())
            .field("disposed", &self.file.is_none())
            .finish()
    }
}
