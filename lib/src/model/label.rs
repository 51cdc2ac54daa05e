use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Jump target inside of a method body
///
/// Labels are indices into a per-method registry: two entries refer to the same position exactly
/// when they carry the same label. Two distinct labels may still mark the same position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Registry handing out one label per distinct key
///
/// Labels are numbered in the order keys are first seen, so building the same method twice
/// produces the same numbering.
#[derive(Debug)]
pub struct Labels<K> {
    labels: HashMap<K, Label>,
}

impl<K: Hash + Eq> Labels<K> {
    pub fn new() -> Labels<K> {
        Labels {
            labels: HashMap::new(),
        }
    }

    /// Get the label for a key, allocating a fresh one the first time the key is seen
    pub fn label(&mut self, key: K) -> Label {
        let next = Label(self.labels.len() as u32);
        *self.labels.entry(key).or_insert(next)
    }

    /// Get the label for a key, without allocating
    pub fn get(&self, key: &K) -> Option<Label> {
        self.labels.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<K: Hash + Eq> Default for Labels<K> {
    fn default() -> Labels<K> {
        Labels::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_by_first_appearance() {
        let mut labels = Labels::new();
        assert_eq!(labels.label(17u32), Label(0));
        assert_eq!(labels.label(3), Label(1));
        assert_eq!(labels.label(17), Label(0));
        assert_eq!(labels.get(&3), Some(Label(1)));
        assert_eq!(labels.get(&4), None);
        assert_eq!(labels.len(), 2);
        assert_eq!(Label(12).to_string(), "L12");
    }
}
