//! Reusable tag instances for repeated unmarshalling passes.
//!
//! Each qualified name has a FIFO queue of tags created so far and a count of
//! free slots. Acquiring a tag hands out the front of the queue and rotates
//! it to the back while free slots remain; otherwise a fresh tag is created
//! and queued. Free slots are only granted by the accounting pass
//! ([`TagPool::update_simple_tags_free_slots`] and its composite
//! counterpart), which the unmarshaller runs after every completed top-level
//! subtree. The queue for a name therefore settles at the peak number of tags
//! of that name used within one subtree.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::qname::QName;
use crate::tag::{CompositeTag, SimpleTag};

#[derive(Debug)]
struct PoolQueue<T> {
    tags: VecDeque<T>,
    free: usize,
}

impl<T> Default for PoolQueue<T> {
    fn default() -> Self {
        Self {
            tags: VecDeque::new(),
            free: 0,
        }
    }
}

impl<T: Clone> PoolQueue<T> {
    fn acquire(&mut self, create: impl FnOnce() -> T) -> (T, bool) {
        if self.free > 0 {
            if let Some(tag) = self.tags.pop_front() {
                self.free -= 1;
                self.tags.push_back(tag.clone());
                return (tag, true);
            }
        }
        let tag = create();
        self.tags.push_back(tag.clone());
        (tag, false)
    }

    fn release_all(&mut self) {
        self.free = self.tags.len();
    }
}

/// Pool of simple and composite tags keyed by qualified name.
#[derive(Debug, Default)]
pub struct TagPool {
    simple: HashMap<QName, PoolQueue<SimpleTag>>,
    composite: HashMap<QName, PoolQueue<CompositeTag>>,
}

impl TagPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached, empty simple tag named exactly `name`.
    pub fn acquire_simple(&mut self, name: &QName) -> SimpleTag {
        let queue = self.simple.entry(name.clone()).or_default();
        let (tag, reused) = queue.acquire(|| SimpleTag::new(name.clone()));
        if reused {
            tag.reset(name.clone());
        }
        trace!(name = %name, reused, "acquired simple tag");
        tag
    }

    /// A detached composite tag without children named exactly `name`.
    pub fn acquire_composite(&mut self, name: &QName) -> CompositeTag {
        let queue = self.composite.entry(name.clone()).or_default();
        let (tag, reused) = queue.acquire(|| CompositeTag::new(name.clone()));
        if reused {
            tag.reset(name.clone());
        }
        trace!(name = %name, reused, "acquired composite tag");
        tag
    }

    /// Makes every queued simple tag available again.
    pub fn update_simple_tags_free_slots(&mut self) {
        self.simple.values_mut().for_each(PoolQueue::release_all);
    }

    /// Makes every queued composite tag available again.
    pub fn update_composite_tags_free_slots(&mut self) {
        self.composite.values_mut().for_each(PoolQueue::release_all);
    }

    /// Number of simple tags pooled under `name`.
    pub fn pooled_simple(&self, name: &QName) -> usize {
        self.simple.get(name).map_or(0, |q| q.tags.len())
    }

    /// Number of composite tags pooled under `name`.
    pub fn pooled_composite(&self, name: &QName) -> usize {
        self.composite.get(name).map_or(0, |q| q.tags.len())
    }

    /// Simple tags under `name` that can still be handed out this pass.
    pub fn free_simple_slots(&self, name: &QName) -> usize {
        self.simple.get(name).map_or(0, |q| q.free)
    }

    /// Composite tags under `name` that can still be handed out this pass.
    pub fn free_composite_slots(&self, name: &QName) -> usize {
        self.composite.get(name).map_or(0, |q| q.free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn test_fresh_until_accounting() {
        let mut pool = TagPool::new();
        let name = QName::local("item");
        let a = pool.acquire_simple(&name);
        let b = pool.acquire_simple(&name);
        assert!(!a.ptr_eq(&b));
        assert_eq!(pool.pooled_simple(&name), 2);
        assert_eq!(pool.free_simple_slots(&name), 0);
    }

    #[test]
    fn test_round_robin_reuse() {
        let mut pool = TagPool::new();
        let name = QName::local("item");
        let a = pool.acquire_simple(&name);
        let b = pool.acquire_simple(&name);
        pool.update_simple_tags_free_slots();
        assert_eq!(pool.free_simple_slots(&name), 2);

        assert!(pool.acquire_simple(&name).ptr_eq(&a));
        assert!(pool.acquire_simple(&name).ptr_eq(&b));
        assert_eq!(pool.free_simple_slots(&name), 0);
        let c = pool.acquire_simple(&name);
        assert!(!c.ptr_eq(&a) && !c.ptr_eq(&b));
        assert_eq!(pool.pooled_simple(&name), 3);
    }

    #[test]
    fn test_steady_state_matches_peak_usage() {
        let mut pool = TagPool::new();
        let name = QName::local("row");
        for _ in 0..5 {
            for _ in 0..3 {
                pool.acquire_composite(&name);
            }
            pool.update_composite_tags_free_slots();
        }
        assert_eq!(pool.pooled_composite(&name), 3);
    }

    #[test]
    fn test_reused_tags_are_reset() {
        let mut pool = TagPool::new();
        let name = QName::with_prefix("urn:a", "node", "a");
        let parent = pool.acquire_composite(&QName::local("parent"));
        let node = pool.acquire_composite(&name);
        node.add_tag(SimpleTag::with_value("x", "1").into()).unwrap();
        node.put_attribute(QName::local("k"), "v");
        parent.add_tag(Tag::Composite(node.clone())).unwrap();
        pool.update_composite_tags_free_slots();

        let again = pool.acquire_composite(&QName::with_prefix("urn:a", "node", "b"));
        assert!(again.ptr_eq(&node));
        assert_eq!(again.child_count(), 0);
        assert!(again.attributes().is_empty());
        assert!(again.parent().is_none());
        assert_eq!(again.name().prefix(), "b");
        assert_eq!(parent.child_count(), 0);

        let leaf = pool.acquire_simple(&QName::local("v"));
        leaf.set_value("old");
        pool.update_simple_tags_free_slots();
        assert_eq!(pool.acquire_simple(&QName::local("v")).value(), "");
    }
}
