//! Mapping between axis tags and their position in variation data.
//!
//! Tuple headers store one coordinate per axis in `fvar` order; the tuple
//! records in this crate key their tents by tag instead.

use core::slice::Iter;

use fnv::FnvHashMap;
use font_types::Tag;

/// An ordered list of axis tags with a reverse lookup.
#[derive(Clone, Debug, Default)]
pub struct AxisIndexMap {
    forw_map: FnvHashMap<Tag, usize>,
    back_map: Vec<Tag>,
}

impl AxisIndexMap {
    /// Build a map from tags in axis order.
    ///
    /// A repeated tag keeps its first position.
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut map = Self::default();
        for tag in tags {
            map.add(tag);
        }
        map
    }

    /// Add `tag` at the end if it is unknown. Returns its position.
    pub fn add(&mut self, tag: Tag) -> usize {
        match self.forw_map.get(&tag) {
            Some(&idx) => idx,
            None => {
                let idx = self.back_map.len();
                self.forw_map.insert(tag, idx);
                self.back_map.push(tag);
                idx
            }
        }
    }

    pub fn len(&self) -> usize {
        self.back_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.back_map.is_empty()
    }

    /// The position of `tag`, if it is known.
    pub fn index(&self, tag: Tag) -> Option<usize> {
        self.forw_map.get(&tag).copied()
    }

    /// The tag at position `idx`.
    pub fn tag(&self, idx: usize) -> Option<Tag> {
        self.back_map.get(idx).copied()
    }

    pub fn tags(&self) -> Iter<'_, Tag> {
        self.back_map.iter()
    }

    /// The axes that remain after removing every tag for which `is_removed`
    /// returns `true`, keeping the original order.
    pub fn retain_axes(&self, mut is_removed: impl FnMut(Tag) -> bool) -> Self {
        Self::new(self.tags().copied().filter(|tag| !is_removed(*tag)))
    }
}
