use std::iter::Enumerate;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// The constant pool is the main user: most entries have width 1, but `long` and `double`
/// constants take up two slots.
#[derive(Clone, Debug)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset for the first element (usually 0, but sometimes 1)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Length of the `OffsetVec` (aka. number of entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current offset size of the `OffsetVec` (aka. offset of the next element to be added)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Offset of the first element
    pub fn initial_offset(&self) -> Offset {
        self.initial_offset
    }

    /// Add an entry to the back
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));
        offset
    }

    /// Get an entry by its offset in the vector
    ///
    /// Returns `None` if the offset is past the end or falls in the middle of a wide element.
    pub fn get_offset(&self, offset: Offset) -> Option<&T> {
        self.entries
            .binary_search_by_key(&offset, |(off, _)| *off)
            .ok()
            .map(|found_idx| &self.entries[found_idx].1)
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

/// Iterator over `(offset, index, element)` triples
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_account_for_width() {
        let mut slots = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(slots.push(Slot::Narrow(0)), Offset(1));
        assert_eq!(slots.push(Slot::Wide(1)), Offset(2));
        assert_eq!(slots.push(Slot::Narrow(2)), Offset(4));
        assert_eq!(slots.offset_len(), Offset(5));
        assert_eq!(slots.len(), 3);

        assert_eq!(slots.get_offset(Offset(2)), Some(&Slot::Wide(1)));
        assert_eq!(slots.get_offset(Offset(3)), None);
        assert_eq!(slots.get_offset(Offset(4)), Some(&Slot::Narrow(2)));
        assert_eq!(slots.get_offset(Offset(5)), None);
        assert_eq!(slots.get_offset(Offset(0)), None);
    }

    #[test]
    fn iterates_with_offsets() {
        let mut slots = OffsetVec::new();
        slots.push(Slot::Wide(7));
        slots.push(Slot::Narrow(8));
        let collected: Vec<(Offset, usize)> = slots.iter().map(|(off, idx, _)| (off, idx)).collect();
        assert_eq!(collected, vec![(Offset(0), 0), (Offset(2), 1)]);
    }
}
