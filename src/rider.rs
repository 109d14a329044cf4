//! rider: sequential character accessors over the two kinds of backing.
//!
//! - `Rider::Memory`: an immutable snapshot (`Arc<[char]>`, shared with the swap worker)
//!   or a growable buffer used for in-memory fallback runs.
//! - `Rider::File`: a `ScratchFile` plus a private cursor.
//!
//! seek() only records the position; file riders realize it on the next read/write.
//! Reads never fail loudly: I/O errors surface as a short read (and are logged here once).

use anyhow::Result;
use log::warn;
use std::sync::Arc;

use crate::metrics::record_truncated_read;
use crate::scratch::ScratchFile;

/// Stable index of a rider inside its owning `RiderTable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RiderId(pub(crate) u32);

#[derive(Debug)]
enum MemoryChars {
    Snapshot(Arc<[char]>),
    Buffer(Vec<char>),
}

#[derive(Debug)]
pub struct MemoryRider {
    chars: MemoryChars,
    pos: u64,
}

impl MemoryRider {
    /// Read-only rider over an immutable snapshot.
    pub fn snapshot(chars: Arc<[char]>) -> Self {
        Self {
            chars: MemoryChars::Snapshot(chars),
            pos: 0,
        }
    }

    /// Writable, growable rider.
    pub fn buffer(initial: Vec<char>) -> Self {
        Self {
            chars: MemoryChars::Buffer(initial),
            pos: 0,
        }
    }

    fn as_slice(&self) -> &[char] {
        match &self.chars {
            MemoryChars::Snapshot(s) => s,
            MemoryChars::Buffer(v) => v,
        }
    }

    /// The shared snapshot, when this rider wraps one.
    pub fn shared(&self) -> Option<&Arc<[char]>> {
        match &self.chars {
            MemoryChars::Snapshot(s) => Some(s),
            MemoryChars::Buffer(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct FileRider {
    file: ScratchFile,
    pos: u64,
}

impl FileRider {
    pub fn new(file: ScratchFile) -> Self {
        Self { file, pos: 0 }
    }

    pub fn file(&self) -> &ScratchFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut ScratchFile {
        &mut self.file
    }
}

#[derive(Debug)]
pub enum Rider {
    Memory(MemoryRider),
    File(FileRider),
}

impl Rider {
    /// Number of chars currently held by the backing.
    pub fn len(&self) -> u64 {
        match self {
            Rider::Memory(m) => m.as_slice().len() as u64,
            Rider::File(f) => f.file.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest position a write may reach (exclusive). Read-only riders end at len().
    pub fn limit(&self) -> u64 {
        if self.is_readonly() {
            self.len()
        } else {
            u64::MAX
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(
            self,
            Rider::Memory(MemoryRider {
                chars: MemoryChars::Snapshot(_),
                ..
            })
        )
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Rider::File(_))
    }

    pub fn position(&self) -> u64 {
        match self {
            Rider::Memory(m) => m.pos,
            Rider::File(f) => f.pos,
        }
    }

    pub fn seek(&mut self, pos: u64) {
        assert!(
            pos <= self.len(),
            "rider seek to {} past end (len={})",
            pos,
            self.len()
        );
        match self {
            Rider::Memory(m) => m.pos = pos,
            Rider::File(f) => f.pos = pos,
        }
    }

    pub fn read_char(&mut self) -> Option<char> {
        let mut one = ['\0'];
        if self.read_chars(&mut one) == 1 {
            Some(one[0])
        } else {
            None
        }
    }

    /// Read up to `buf.len()` chars at the cursor and advance it. A short count
    /// means end of backing or a failed read.
    pub fn read_chars(&mut self, buf: &mut [char]) -> usize {
        match self {
            Rider::Memory(m) => {
                let src = m.as_slice();
                let start = (m.pos as usize).min(src.len());
                let n = buf.len().min(src.len() - start);
                buf[..n].copy_from_slice(&src[start..start + n]);
                m.pos += n as u64;
                n
            }
            Rider::File(f) => match f.file.read_chars(f.pos, buf) {
                Ok(n) => {
                    f.pos += n as u64;
                    n
                }
                Err(e) => {
                    record_truncated_read();
                    warn!(
                        "rider: read of {} chars at {} from {} failed: {:#}",
                        buf.len(),
                        f.pos,
                        f.file.path().display(),
                        e
                    );
                    0
                }
            },
        }
    }

    pub fn write_char(&mut self, c: char) -> Result<()> {
        self.write_chars(&[c])
    }

    /// Write `src` at the cursor and advance it, growing the backing as needed.
    /// Panics on a read-only rider.
    pub fn write_chars(&mut self, src: &[char]) -> Result<()> {
        assert!(!self.is_readonly(), "write to a read-only rider");
        match self {
            Rider::Memory(m) => {
                let pos = m.pos as usize;
                if let MemoryChars::Buffer(v) = &mut m.chars {
                    let overlap = src.len().min(v.len() - pos);
                    v[pos..pos + overlap].copy_from_slice(&src[..overlap]);
                    v.extend_from_slice(&src[overlap..]);
                }
                m.pos += src.len() as u64;
                Ok(())
            }
            Rider::File(f) => {
                f.file.write_chars(f.pos, src)?;
                f.pos += src.len() as u64;
                Ok(())
            }
        }
    }
}

/// Owner of every rider used by a store; runs refer to riders by `RiderId`.
#[derive(Debug, Default)]
pub struct RiderTable {
    slots: Vec<Option<Rider>>,
}

impl RiderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rider: Rider) -> RiderId {
        if let Some(i) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[i] = Some(rider);
            return RiderId(i as u32);
        }
        self.slots.push(Some(rider));
        RiderId((self.slots.len() - 1) as u32)
    }

    pub fn get(&self, id: RiderId) -> Option<&Rider> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: RiderId) -> Option<&mut Rider> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: RiderId) -> Option<Rider> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.take())
    }

    pub fn ids(&self) -> Vec<RiderId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| RiderId(i as u32))
            .collect()
    }

    /// Drop every rider (scratch files are removed by their Drop).
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_and_truncates() {
        let snap: Arc<[char]> = "abcdef".chars().collect::<Vec<_>>().into();
        let mut r = Rider::Memory(MemoryRider::snapshot(snap));
        assert!(r.is_readonly());
        assert_eq!(r.limit(), 6);

        r.seek(4);
        let mut buf = ['\0'; 8];
        assert_eq!(r.read_chars(&mut buf), 2);
        assert_eq!(&buf[..2], &['e', 'f']);
        assert_eq!(r.read_char(), None);
    }

    #[test]
    #[should_panic(expected = "read-only")]
    fn snapshot_rejects_writes() {
        let snap: Arc<[char]> = vec!['x'].into();
        let mut r = Rider::Memory(MemoryRider::snapshot(snap));
        let _ = r.write_char('y');
    }

    #[test]
    #[should_panic(expected = "past end")]
    fn seek_past_end_panics() {
        let mut r = Rider::Memory(MemoryRider::buffer(vec!['a']));
        r.seek(2);
    }

    #[test]
    fn buffer_overwrites_then_extends() -> Result<()> {
        let mut r = Rider::Memory(MemoryRider::buffer("hello".chars().collect()));
        assert!(!r.is_readonly());
        r.seek(3);
        r.write_chars(&['L', 'O', '!', '!'])?;
        assert_eq!(r.len(), 7);
        assert_eq!(r.position(), 7);

        r.seek(0);
        let mut buf = ['\0'; 7];
        assert_eq!(r.read_chars(&mut buf), 7);
        assert_eq!(buf.iter().collect::<String>(), "helLO!!");
        Ok(())
    }

    #[test]
    fn table_reuses_slots() {
        let mut t = RiderTable::new();
        let a = t.insert(Rider::Memory(MemoryRider::buffer(vec![])));
        let b = t.insert(Rider::Memory(MemoryRider::buffer(vec!['z'])));
        assert!(t.remove(a).is_some());
        assert!(t.get(a).is_none());
        let c = t.insert(Rider::Memory(MemoryRider::buffer(vec![])));
        assert_eq!(a, c);
        assert_eq!(t.ids(), vec![c, b]);
    }
}
