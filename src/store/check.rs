//! store/check: structural self-check of a TextStore (tests, CLI diagnostics).

use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::rider::RiderId;

use super::core::TextStore;

impl TextStore {
    /// Verify chain links, length accounting, spare hygiene, span disjointness
    /// and the position cache.
    pub fn check_invariants(&self) -> Result<()> {
        let mut spans: HashMap<RiderId, Vec<(u64, u64)>> = HashMap::new();
        let live = self.runs.live();

        // ----- chain -----
        let mut sum = 0usize;
        let mut count = 0usize;
        let mut prev = None;
        let mut cur = self.head;
        let mut cache_seen = self.cache.is_none();
        while let Some(id) = cur {
            count += 1;
            if count > live {
                return Err(anyhow!("run chain has a cycle"));
            }
            let run = self.runs.get(id);
            if run.prev != prev {
                return Err(anyhow!("run {:?}: prev {:?} != {:?}", id, run.prev, prev));
            }
            if run.len == 0 {
                return Err(anyhow!("run {:?} is empty", id));
            }
            let rider = self
                .riders
                .get(run.rider)
                .ok_or_else(|| anyhow!("run {:?} references missing rider {:?}", id, run.rider))?;
            if run.end() > rider.len() {
                return Err(anyhow!(
                    "run {:?} ends at {} past rider length {}",
                    id,
                    run.end(),
                    rider.len()
                ));
            }
            if let Some((cid, cstart)) = self.cache {
                if cid == id {
                    if cstart != sum {
                        return Err(anyhow!(
                            "position cache says {:?} starts at {}, chain says {}",
                            id,
                            cstart,
                            sum
                        ));
                    }
                    cache_seen = true;
                }
            }
            spans.entry(run.rider).or_default().push((run.offset, run.end()));
            sum += run.len;
            prev = Some(id);
            cur = run.next;
        }
        if self.tail != prev {
            return Err(anyhow!("tail {:?} != last chain run {:?}", self.tail, prev));
        }
        if sum != self.length {
            return Err(anyhow!("chain holds {} chars, length says {}", sum, self.length));
        }
        if !cache_seen {
            return Err(anyhow!("position cache names a run outside the chain"));
        }

        // ----- spares -----
        let mut dead = 0usize;
        for &sid in &self.spares {
            if !self.runs.contains(sid) {
                return Err(anyhow!("spare {:?} was released", sid));
            }
            let run = self.runs.get(sid);
            if run.prev.is_some() || run.next.is_some() {
                return Err(anyhow!("spare {:?} is still linked", sid));
            }
            match self.riders.get(run.rider) {
                Some(r) if !r.is_readonly() => {}
                Some(_) => return Err(anyhow!("spare {:?} sits on a read-only rider", sid)),
                None => return Err(anyhow!("spare {:?} references a missing rider", sid)),
            }
            spans.entry(run.rider).or_default().push((run.offset, run.end()));
            dead += run.len;
        }
        if dead != self.dead_length {
            return Err(anyhow!("spares hold {} chars, dead_length says {}", dead, self.dead_length));
        }

        // ----- no overlapping storage -----
        for (rider, list) in spans.iter_mut() {
            list.sort_unstable();
            for w in list.windows(2) {
                if w[1].0 < w[0].1 {
                    return Err(anyhow!(
                        "rider {:?}: spans {:?} and {:?} overlap",
                        rider,
                        w[0],
                        w[1]
                    ));
                }
            }
        }
        Ok(())
    }
}
