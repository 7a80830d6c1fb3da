//! Dependency Tracking
//!
//! A derived store tracks two sets of input positions:
//!
//! - *pending*: inputs that have been invalidated but not yet re-notified.
//!   While any input is pending the derived store does not recompute.
//! - *changed*: inputs that notified since the last recompute. Handed to
//!   manual recompute functions as a [`ChangeSet`].
//!
//! Both are [`InputMask`]s: bitsets that grow with the number of inputs.

use std::fmt;

use smallvec::SmallVec;

const WORD_BITS: usize = u64::BITS as usize;

/// A growable set of input positions.
///
/// Up to 64 inputs fit inline without allocating.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InputMask {
    words: SmallVec<[u64; 1]>,
}

impl InputMask {
    /// Create an empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input position.
    pub fn insert(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (index % WORD_BITS);
    }

    /// Remove an input position.
    pub fn remove(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1 << (index % WORD_BITS));
        }
    }

    /// Check whether an input position is in the mask.
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .map_or(false, |word| word & (1 << (index % WORD_BITS)) != 0)
    }

    /// True when no position is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Number of positions set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Iterate positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word, bits)| {
            (0..WORD_BITS)
                .filter(move |bit| bits & (1 << bit) != 0)
                .map(move |bit| word * WORD_BITS + bit)
        })
    }
}

impl fmt::Debug for InputMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for InputMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = Self::new();
        for index in iter {
            mask.insert(index);
        }
        mask
    }
}

/// The inputs that changed since the previous recompute.
///
/// Keys are positions (`usize`) for positional inputs and names for
/// [`NamedInputs`](super::NamedInputs). The set is empty for the first
/// recompute after a derived store activates.
#[derive(Clone, PartialEq, Eq)]
pub struct ChangeSet<K> {
    mask: InputMask,
    keys: SmallVec<[K; 4]>,
}

impl<K> ChangeSet<K> {
    pub(crate) fn new(mask: InputMask, key: impl Fn(usize) -> K) -> Self {
        let keys = mask.iter().map(key).collect();
        Self { mask, keys }
    }

    /// True when no input changed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of inputs that changed.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check whether the input with this key changed.
    pub fn contains(&self, key: &K) -> bool
    where
        K: PartialEq,
    {
        self.keys.iter().any(|changed| changed == key)
    }

    /// Check whether the input at this position changed.
    pub fn contains_index(&self, index: usize) -> bool {
        self.mask.contains(index)
    }

    /// Keys of the changed inputs, in input order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.keys.iter()
    }

    /// Positions of the changed inputs, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter()
    }

    /// The changed positions as a mask.
    pub fn mask(&self) -> &InputMask {
        &self.mask
    }
}

impl<K: fmt::Debug> fmt::Debug for ChangeSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.iter()).finish()
    }
}
