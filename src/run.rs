//! run: spans of one rider, linked into the document chain.
//!
//! Runs live in a `RunArena` and refer to each other by `RunId`; `prev`/`next` are
//! arena indices. Freed slots are reused through the arena's own slot free-list,
//! which is separate from the store's spare-run list (spares keep their storage).

use crate::rider::{Rider, RiderId};

/// Stable index of a run inside its `RunArena`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub rider: RiderId,
    pub offset: u64,
    pub len: usize,
    pub prev: Option<RunId>,
    pub next: Option<RunId>,
}

impl Run {
    pub fn new(rider: RiderId, offset: u64, len: usize) -> Self {
        Self {
            rider,
            offset,
            len,
            prev: None,
            next: None,
        }
    }

    /// One past the last rider position covered by this run.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }

    /// `other` continues this run in the same rider.
    #[inline]
    pub fn is_mergeable_with(&self, other: &Run) -> bool {
        other.rider == self.rider && other.offset == self.end()
    }

    /// Char at `idx` (relative to the run). None on a failed read.
    pub fn char_at(&self, rider: &mut Rider, idx: usize) -> Option<char> {
        debug_assert!(idx < self.len);
        rider.seek(self.offset + idx as u64);
        rider.read_char()
    }

    /// Copy `out.len()` chars starting at `from` (relative to the run). Returns the count read.
    pub fn copy_into(&self, rider: &mut Rider, from: usize, out: &mut [char]) -> usize {
        debug_assert!(from + out.len() <= self.len);
        rider.seek(self.offset + from as u64);
        rider.read_chars(out)
    }

    /// Append `count` chars starting at `from` to `out`, reading through `scratch` in
    /// one seek. Returns false if the rider delivered fewer chars than asked.
    pub fn append_to(
        &self,
        rider: &mut Rider,
        from: usize,
        count: usize,
        scratch: &mut Vec<char>,
        out: &mut String,
    ) -> bool {
        debug_assert!(from + count <= self.len);
        if count == 0 {
            return true;
        }
        rider.seek(self.offset + from as u64);
        let chunk = scratch.len().max(1);
        let mut left = count;
        while left > 0 {
            let n = left.min(chunk);
            if scratch.len() < n {
                scratch.resize(n, '\0');
            }
            let got = rider.read_chars(&mut scratch[..n]);
            out.extend(&scratch[..got]);
            if got < n {
                return false;
            }
            left -= n;
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct RunArena {
    slots: Vec<Option<Run>>,
    free: Vec<RunId>,
}

impl RunArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, run: Run) -> RunId {
        if let Some(id) = self.free.pop() {
            self.slots[id.0 as usize] = Some(run);
            return id;
        }
        self.slots.push(Some(run));
        RunId((self.slots.len() - 1) as u32)
    }

    pub fn release(&mut self, id: RunId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    #[inline]
    pub fn get(&self, id: RunId) -> &Run {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("dangling run id")
    }

    #[inline]
    pub fn get_mut(&mut self, id: RunId) -> &mut Run {
        self.slots[id.0 as usize]
            .as_mut()
            .expect("dangling run id")
    }

    pub fn contains(&self, id: RunId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Some(_)))
    }

    /// Runs currently allocated (chain + spares).
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
