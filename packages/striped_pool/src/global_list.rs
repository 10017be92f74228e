use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::slot::NIL_INDEX;

/// One snapshot of the global free-list head: the index of the top batch and a
/// 32-bit anti-ABA tag, packed into a single 64-bit word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GlobalHead {
    index: u32,
    tag: u32,
}

impl GlobalHead {
    const EMPTY: Self = Self {
        index: NIL_INDEX,
        tag: 0,
    };

    #[must_use]
    fn pack(self) -> u64 {
        (u64::from(self.tag) << 32) | u64::from(self.index)
    }

    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "both halves are masked to 32 bits before narrowing"
    )]
    fn unpack(bits: u64) -> Self {
        Self {
            index: (bits & u64::from(u32::MAX)) as u32,
            tag: (bits >> 32) as u32,
        }
    }
}

/// The shared overflow list behind all stripes.
///
/// Stripes that fill up spill their entire list here as a single batch, and
/// stripes that run dry pull one batch back out. Batches are linked through the
/// `global_next` field of their head slot, so splicing a batch is one swap no
/// matter how many indices the batch carries; the indices inside a batch remain
/// chained through their `local_next` links, untouched since the spill.
///
/// Like [`LocalStripe`][crate::stripe::LocalStripe], this type resolves indices
/// to link fields through a caller-provided accessor.
#[derive(Debug)]
pub(crate) struct GlobalFreeList {
    head: AtomicU64,
}

impl GlobalFreeList {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU64::new(GlobalHead::EMPTY.pack()),
        }
    }

    #[must_use]
    fn load(&self) -> GlobalHead {
        // Acquire: pairs with the release below so an adopted batch's chain is
        // visible to the adopter.
        GlobalHead::unpack(self.head.load(Ordering::Acquire))
    }

    #[must_use]
    fn try_replace(&self, current: GlobalHead, next: GlobalHead) -> bool {
        self.head
            .compare_exchange_weak(
                current.pack(),
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Splices one batch onto the list. O(1) regardless of batch size.
    pub(crate) fn push_batch<'a>(
        &self,
        batch_head: u32,
        link_of: impl Fn(u32) -> &'a AtomicU32,
    ) {
        loop {
            let current = self.load();

            // Chain the incoming batch in front of the old top batch. Relaxed
            // suffices: the swap below releases this write.
            link_of(batch_head).store(current.index, Ordering::Relaxed);

            let next = GlobalHead {
                index: batch_head,
                tag: current.tag.wrapping_add(1),
            };

            if self.try_replace(current, next) {
                return;
            }
        }
    }

    /// Pops one batch, or `None` if the list is empty (the caller then attempts
    /// growth instead).
    pub(crate) fn pop_batch<'a>(&self, link_of: impl Fn(u32) -> &'a AtomicU32) -> Option<u32> {
        loop {
            let current = self.load();

            if current.index == NIL_INDEX {
                return None;
            }

            // As in the stripe pop: reading a link of a batch that another thread
            // may concurrently adopt cannot fault, and the tag rejects any stale
            // snapshot at the swap.
            let successor = link_of(current.index).load(Ordering::Relaxed);

            let next = GlobalHead {
                index: successor,
                tag: current.tag.wrapping_add(1),
            };

            if self.try_replace(current, next) {
                return Some(current.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        clippy::cast_possible_truncation,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use super::*;

    fn links(count: usize) -> Vec<AtomicU32> {
        (0..count).map(|_| AtomicU32::new(0)).collect()
    }

    #[test]
    fn head_packing_round_trips() {
        let head = GlobalHead {
            index: 77,
            tag: 0xDEAD_BEEF,
        };

        assert_eq!(GlobalHead::unpack(head.pack()), head);
    }

    #[test]
    fn batches_come_back_lifo() {
        let links = links(8);
        let list = GlobalFreeList::new();

        list.push_batch(2, |i| &links[i as usize]);
        list.push_batch(5, |i| &links[i as usize]);

        assert_eq!(list.pop_batch(|i| &links[i as usize]), Some(5));
        assert_eq!(list.pop_batch(|i| &links[i as usize]), Some(2));
        assert_eq!(list.pop_batch(|i| &links[i as usize]), None);
    }

    #[test]
    fn splice_leaves_batch_chains_alone() {
        let links = links(8);
        let list = GlobalFreeList::new();

        // The batch's internal chain lives in different links (the local ones in
        // the real pool), so pushing batches must not disturb it. Here we only
        // verify that push/pop touch nothing but the global links of batch heads.
        list.push_batch(3, |i| &links[i as usize]);

        assert_eq!(links[3].load(Ordering::Relaxed), NIL_INDEX);

        list.push_batch(6, |i| &links[i as usize]);
        assert_eq!(links[6].load(Ordering::Relaxed), 3);
    }
}
