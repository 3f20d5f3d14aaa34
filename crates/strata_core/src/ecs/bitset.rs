//! # Id Bitsets
//!
//! Fixed 64-bit sets over small integer ids. Schema algebra (union,
//! difference, subset test) is evaluated on these once at registration
//! time and cached.

use std::fmt;
use std::marker::PhantomData;

/// Maximum number of ids of one kind (bits in the backing word).
pub const MAX_IDS: usize = 64;

/// A small integer id that can live in an [`IdSet`].
pub trait Id: Copy + Eq + fmt::Debug {
    /// Bit position of this id (`0..MAX_IDS`).
    fn index(self) -> usize;

    /// Rebuilds an id from its bit position.
    fn from_index(index: usize) -> Self;
}

/// A set of ids backed by one `u64`.
pub struct IdSet<I> {
    bits: u64,
    _marker: PhantomData<fn() -> I>,
}

impl<I> Clone for IdSet<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for IdSet<I> {}

impl<I> PartialEq for IdSet<I> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<I> Eq for IdSet<I> {}

impl<I> Default for IdSet<I> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<I> IdSet<I> {
    /// The empty set.
    pub const EMPTY: Self = Self::from_bits(0);

    /// Builds a set from its raw word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            bits,
            _marker: PhantomData,
        }
    }

    /// Raw word.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Number of ids in the set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Returns `true` if the set holds no ids.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// `self ∪ other`.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.bits | other.bits)
    }

    /// `self ∩ other`.
    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self::from_bits(self.bits & other.bits)
    }

    /// `self \ other`.
    #[inline]
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self::from_bits(self.bits & !other.bits)
    }

    /// Returns `true` if every id of `self` is in `other`.
    #[inline]
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.bits & !other.bits == 0
    }

    /// Returns `true` if the sets share at least one id.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.bits & other.bits != 0
    }
}

impl<I: Id> IdSet<I> {
    /// Set holding exactly `id`.
    #[inline]
    #[must_use]
    pub fn single(id: I) -> Self {
        Self::from_bits(Self::bit(id))
    }

    #[inline]
    fn bit(id: I) -> u64 {
        debug_assert!(id.index() < MAX_IDS, "id {id:?} out of bitset range");
        1u64 << id.index()
    }

    /// Adds `id`; returns `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, id: I) -> bool {
        let bit = Self::bit(id);
        let fresh = self.bits & bit == 0;
        self.bits |= bit;
        fresh
    }

    /// Removes `id`; returns `true` if it was present.
    #[inline]
    pub fn remove(&mut self, id: I) -> bool {
        let bit = Self::bit(id);
        let present = self.bits & bit != 0;
        self.bits &= !bit;
        present
    }

    /// Membership test.
    #[inline]
    #[must_use]
    pub fn contains(self, id: I) -> bool {
        self.bits & Self::bit(id) != 0
    }

    /// Number of ids in the set that are smaller than `id`.
    ///
    /// This is the position `id` has (or would have) in an array sorted by
    /// id and aligned with the set.
    #[inline]
    #[must_use]
    pub fn rank(self, id: I) -> usize {
        (self.bits & (Self::bit(id) - 1)).count_ones() as usize
    }

    /// Iterates the ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = I> {
        let mut bits = self.bits;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            // Clear lowest set bit
            bits &= bits - 1;
            Some(I::from_index(index))
        })
    }
}

impl<I: Id> FromIterator<I> for IdSet<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<I: Id> fmt::Debug for IdSet<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Bit(usize);

    impl Id for Bit {
        fn index(self) -> usize {
            self.0
        }

        fn from_index(index: usize) -> Self {
            Self(index)
        }
    }

    fn set(ids: &[usize]) -> IdSet<Bit> {
        ids.iter().map(|&i| Bit(i)).collect()
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut s = IdSet::<Bit>::EMPTY;
        assert!(s.insert(Bit(3)));
        assert!(!s.insert(Bit(3)));
        assert!(s.insert(Bit(63)));
        assert!(s.contains(Bit(63)));
        assert_eq!(s.len(), 2);

        assert!(s.remove(Bit(3)));
        assert!(!s.remove(Bit(3)));
        assert!(!s.contains(Bit(3)));
    }

    #[test]
    fn test_set_algebra() {
        let a = set(&[0, 1, 2]);
        let b = set(&[1, 2, 5]);

        assert_eq!(a.union(b), set(&[0, 1, 2, 5]));
        assert_eq!(a.intersection(b), set(&[1, 2]));
        assert_eq!(a.difference(b), set(&[0]));
        assert!(set(&[1, 2]).is_subset(a));
        assert!(!b.is_subset(a));
        assert!(a.intersects(b));
        assert!(!set(&[7]).intersects(a));
        assert!(IdSet::<Bit>::EMPTY.is_subset(a));
    }

    #[test]
    fn test_rank_and_iter() {
        let s = set(&[2, 9, 40]);
        assert_eq!(s.rank(Bit(2)), 0);
        assert_eq!(s.rank(Bit(9)), 1);
        assert_eq!(s.rank(Bit(40)), 2);
        assert_eq!(s.rank(Bit(63)), 3);

        let ids: Vec<usize> = s.iter().map(|b| b.0).collect();
        assert_eq!(ids, vec![2, 9, 40]);
        assert_eq!(format!("{:?}", set(&[1])), "{Bit(1)}");
    }
}
