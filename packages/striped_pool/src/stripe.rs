use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::slot::NIL_INDEX;

/// Mask selecting the 24 bits of the anti-ABA tag carried in a stripe head.
const TAG_MASK: u32 = 0x00FF_FFFF;

/// One snapshot of a stripe's free-list head, packed into a single 64-bit word so
/// that the whole state transitions atomically under compare-and-swap:
///
/// - bits 0..32: index of the top slot, or [`NIL_INDEX`] when the stripe is empty,
/// - bits 32..40: length of the list (bounded by the per-stripe limit),
/// - bits 40..64: a tag incremented on every head change.
///
/// The tag is what defeats ABA races: if another thread pops an index and pushes it
/// back between our load and our compare-and-swap, the index bits look unchanged
/// but the tag differs, so the stale swap fails and the loop retries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct StripeHead {
    pub(crate) index: u32,
    pub(crate) tag: u32,
    pub(crate) count: u8,
}

impl StripeHead {
    pub(crate) const EMPTY: Self = Self {
        index: NIL_INDEX,
        tag: 0,
        count: 0,
    };

    #[must_use]
    fn pack(self) -> u64 {
        debug_assert!(self.tag <= TAG_MASK);

        (u64::from(self.tag) << 40) | (u64::from(self.count) << 32) | u64::from(self.index)
    }

    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "every field is masked to its packed width before narrowing"
    )]
    fn unpack(bits: u64) -> Self {
        Self {
            index: (bits & u64::from(u32::MAX)) as u32,
            tag: ((bits >> 40) & u64::from(TAG_MASK)) as u32,
            count: ((bits >> 32) & 0xFF) as u8,
        }
    }

    /// The tag for the next head value. Wraps within the tag width; a stale
    /// compare-and-swap would only succeed if exactly 2^24 head changes happened
    /// between one thread's load and swap, which does not occur in practice.
    #[must_use]
    fn next_tag(self) -> u32 {
        self.tag.wrapping_add(1) & TAG_MASK
    }
}

/// The result of one [`LocalStripe::push()`] call.
#[derive(Debug)]
pub(crate) enum PushOutcome {
    /// The index is now on the stripe.
    Pushed,

    /// The stripe was at its limit, so its entire former list was detached in one
    /// swap. The caller must splice the detached batch onto the global free list
    /// and then retry the push; the pushed index is not yet on any list.
    Spilled {
        /// Top of the detached list. Exactly `limit` indices hang off it through
        /// their local links, terminated by [`NIL_INDEX`].
        batch_head: u32,
    },
}

/// One of the pool's independent free lists.
///
/// Each calling thread is deterministically mapped to a stripe so that unrelated
/// threads usually touch different heads. The head is a tagged 64-bit word (see
/// [`StripeHead`]); the list itself is threaded through the slots' `local_next`
/// links, so pushing and popping never allocates.
///
/// The stripe does not know about slots. Callers pass a `link_of` accessor that
/// resolves an index to its link field; this keeps the lock-free state machine
/// independently testable against a plain array of links.
#[derive(Debug)]
pub(crate) struct LocalStripe {
    head: AtomicU64,
}

impl LocalStripe {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU64::new(StripeHead::EMPTY.pack()),
        }
    }

    #[must_use]
    fn load(&self) -> StripeHead {
        // Acquire: pairs with the release in try_replace() so that a popped
        // index's link chain and element bytes are visible to this thread.
        StripeHead::unpack(self.head.load(Ordering::Acquire))
    }

    #[must_use]
    fn try_replace(&self, current: StripeHead, next: StripeHead) -> bool {
        // AcqRel on success: release our link writes to the next popper and
        // acquire the previous owner's writes in the same step.
        self.head
            .compare_exchange_weak(
                current.pack(),
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Pushes one free index onto the stripe.
    ///
    /// If the stripe is at `limit`, the entire current list is detached instead and
    /// reported through [`PushOutcome::Spilled`]; the push did not happen and must
    /// be retried after the batch has been handed to the global free list.
    pub(crate) fn push<'a>(
        &self,
        index: u32,
        limit: u8,
        link_of: impl Fn(u32) -> &'a AtomicU32,
    ) -> PushOutcome {
        loop {
            let current = self.load();

            if current.count >= limit {
                let empty = StripeHead {
                    index: NIL_INDEX,
                    tag: current.next_tag(),
                    count: 0,
                };

                if self.try_replace(current, empty) {
                    return PushOutcome::Spilled {
                        batch_head: current.index,
                    };
                }

                continue;
            }

            // Link the incoming index in front of the old head. Relaxed suffices:
            // the swap below releases this write before any other thread can pop
            // the index.
            link_of(index).store(current.index, Ordering::Relaxed);

            let next = StripeHead {
                index,
                tag: current.next_tag(),
                count: current
                    .count
                    .checked_add(1)
                    .expect("count is below the limit, which fits in u8"),
            };

            if self.try_replace(current, next) {
                return PushOutcome::Pushed;
            }
        }
    }

    /// Pops the most recently pushed index, or `None` if the stripe is empty
    /// (the caller then consults the global free list or grows the arena).
    pub(crate) fn pop<'a>(&self, link_of: impl Fn(u32) -> &'a AtomicU32) -> Option<u32> {
        loop {
            let current = self.load();

            if current.index == NIL_INDEX {
                return None;
            }

            // Chasing the link of a slot that another thread may pop and reuse
            // concurrently is harmless: slot memory is never unmapped, so the read
            // cannot fault, and if the list moved on the tag makes the swap below
            // fail even when the same index came back in the meantime.
            let successor = link_of(current.index).load(Ordering::Relaxed);

            let next = StripeHead {
                index: successor,
                tag: current.next_tag(),
                count: current
                    .count
                    .checked_sub(1)
                    .expect("a non-empty stripe has a nonzero count"),
            };

            if self.try_replace(current, next) {
                return Some(current.index);
            }
        }
    }

    /// Installs an adopted batch as this stripe's list. Succeeds only if the
    /// stripe is still empty; a single attempt, because on failure the caller
    /// falls back to pushing the batch elements individually.
    #[must_use]
    pub(crate) fn install(&self, batch_head: u32, count: u8) -> bool {
        let current = self.load();

        if current.index != NIL_INDEX {
            return false;
        }

        let next = StripeHead {
            index: batch_head,
            tag: current.next_tag(),
            count,
        };

        // A strong exchange: a spurious failure here would needlessly send us down
        // the element-wise fallback path.
        self.head
            .compare_exchange(
                current.pack(),
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
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

    /// A standalone set of links, standing in for the arena's slots.
    fn links(count: usize) -> Vec<AtomicU32> {
        (0..count).map(|_| AtomicU32::new(0)).collect()
    }

    #[test]
    fn head_packing_round_trips() {
        let head = StripeHead {
            index: 1234,
            tag: 0x00AB_CDEF,
            count: 200,
        };

        assert_eq!(StripeHead::unpack(head.pack()), head);
    }

    #[test]
    fn empty_head_is_all_zero() {
        assert_eq!(StripeHead::EMPTY.pack(), 0);
    }

    #[test]
    fn tag_wraps_within_its_width() {
        let head = StripeHead {
            index: 1,
            tag: TAG_MASK,
            count: 1,
        };

        assert_eq!(head.next_tag(), 0);
    }

    #[test]
    fn push_pop_is_lifo() {
        let links = links(8);
        let stripe = LocalStripe::new();

        for index in [3, 5, 7] {
            assert!(matches!(
                stripe.push(index, 10, |i| &links[i as usize]),
                PushOutcome::Pushed
            ));
        }

        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(7));
        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(5));
        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(3));
        assert_eq!(stripe.pop(|i| &links[i as usize]), None);
    }

    #[test]
    fn every_transition_bumps_the_tag() {
        let links = links(4);
        let stripe = LocalStripe::new();

        let tag_before = stripe.load().tag;

        assert!(matches!(
            stripe.push(1, 4, |i| &links[i as usize]),
            PushOutcome::Pushed
        ));
        let tag_after_push = stripe.load().tag;
        assert_ne!(tag_before, tag_after_push);

        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(1));
        assert_ne!(tag_after_push, stripe.load().tag);
    }

    #[test]
    fn full_stripe_spills_its_whole_list() {
        let links = links(8);
        let stripe = LocalStripe::new();

        assert!(matches!(
            stripe.push(1, 2, |i| &links[i as usize]),
            PushOutcome::Pushed
        ));
        assert!(matches!(
            stripe.push(2, 2, |i| &links[i as usize]),
            PushOutcome::Pushed
        ));

        // Third push exceeds the limit: the stripe hands back its current list.
        let outcome = stripe.push(3, 2, |i| &links[i as usize]);
        let PushOutcome::Spilled { batch_head } = outcome else {
            panic!("expected a spill, got {outcome:?}");
        };

        assert_eq!(batch_head, 2);
        assert_eq!(links[2].load(Ordering::Relaxed), 1);
        assert_eq!(links[1].load(Ordering::Relaxed), NIL_INDEX);

        // The stripe is now empty and the rejected index still needs its push.
        let head = stripe.load();
        assert_eq!(head.index, NIL_INDEX);
        assert_eq!(head.count, 0);
        assert!(matches!(
            stripe.push(3, 2, |i| &links[i as usize]),
            PushOutcome::Pushed
        ));
        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(3));
    }

    #[test]
    fn install_fills_an_empty_stripe() {
        let links = links(8);

        // Build a chain 5 -> 4 -> nil by hand.
        links[5].store(4, Ordering::Relaxed);
        links[4].store(NIL_INDEX, Ordering::Relaxed);

        let stripe = LocalStripe::new();
        assert!(stripe.install(5, 2));

        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(5));
        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(4));
        assert_eq!(stripe.pop(|i| &links[i as usize]), None);
    }

    #[test]
    fn install_rejects_a_non_empty_stripe() {
        let links = links(8);
        let stripe = LocalStripe::new();

        assert!(matches!(
            stripe.push(1, 4, |i| &links[i as usize]),
            PushOutcome::Pushed
        ));

        assert!(!stripe.install(5, 2));
        assert_eq!(stripe.pop(|i| &links[i as usize]), Some(1));
    }

    #[test]
    fn count_tracks_list_length() {
        let links = links(8);
        let stripe = LocalStripe::new();

        assert_eq!(stripe.load().count, 0);

        for (expected, index) in [1_u8, 2, 3].into_iter().zip([4_u32, 5, 6]) {
            assert!(matches!(
                stripe.push(index, 10, |i| &links[i as usize]),
                PushOutcome::Pushed
            ));
            assert_eq!(stripe.load().count, expected);
        }

        let _popped = stripe.pop(|i| &links[i as usize]);
        assert_eq!(stripe.load().count, 2);
    }
}
