//! Fixed pool of cached pages for one scratch file.
//!
//! Design:
//! - `slots` holds N pages of `page_chars` chars each; a slot is bound to at most one page number.
//! - lookup() scans the slots linearly (N is tiny, 4 by default).
//! - victim() hands out slots round-robin; the caller flushes a dirty victim before rebinding it.
//!
//! Notes:
//! - No I/O here. ScratchFile owns the file handle and drives load/flush.
//! - invalidate_all() forgets bindings without touching the buffers (purge path).

pub(crate) struct Page {
    /// Page number bound to this slot (offset / page_chars), None when free.
    pub(crate) number: Option<u64>,
    pub(crate) dirty: bool,
    pub(crate) buf: Vec<char>,
}

pub(crate) struct PagePool {
    page_chars: usize,
    slots: Vec<Page>,
    next_victim: usize,
}

impl PagePool {
    pub(crate) fn new(pages: usize, page_chars: usize) -> Self {
        let pages = pages.max(1);
        let page_chars = page_chars.max(1);
        let slots = (0..pages)
            .map(|_| Page {
                number: None,
                dirty: false,
                buf: vec!['\0'; page_chars],
            })
            .collect();
        Self {
            page_chars,
            slots,
            next_victim: 0,
        }
    }

    #[inline]
    pub(crate) fn page_chars(&self) -> usize {
        self.page_chars
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Slot currently holding `number`, if cached.
    pub(crate) fn lookup(&self, number: u64) -> Option<usize> {
        self.slots.iter().position(|p| p.number == Some(number))
    }

    /// Next slot to reuse. Free slots are preferred over bound ones.
    pub(crate) fn victim(&mut self) -> usize {
        if let Some(free) = self.slots.iter().position(|p| p.number.is_none()) {
            return free;
        }
        let v = self.next_victim;
        self.next_victim = (self.next_victim + 1) % self.slots.len();
        v
    }

    #[inline]
    pub(crate) fn slot(&self, idx: usize) -> &Page {
        &self.slots[idx]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, idx: usize) -> &mut Page {
        &mut self.slots[idx]
    }

    /// Indices of dirty slots (flush order = slot order).
    pub(crate) fn dirty_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.dirty && p.number.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// Forget every binding; buffers are kept allocated.
    pub(crate) fn invalidate_all(&mut self) {
        for p in &mut self.slots {
            p.number = None;
            p.dirty = false;
        }
        self.next_victim = 0;
    }
}
