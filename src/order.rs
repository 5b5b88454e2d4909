//! Document order of a composite's children.

use crate::error::{Error, Result};
use crate::qname::QName;
use crate::tag::Tag;

/// The interleaved document order of every child attached to a composite.
///
/// Children are also grouped by name inside the composite for lookups; the
/// order is what writers walk. It holds exactly the attached children, in the
/// order they were added, with removed children dropped.
#[derive(Debug, Default, Clone)]
pub struct Order {
    tags: Vec<Tag>,
}

impl Order {
    /// Number of children.
    #[inline]
    pub fn size(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` when there are no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Child at `position`.
    pub fn tag_at(&self, position: usize) -> Result<Tag> {
        self.check_range("position", position)?;
        Ok(self.tags[position].clone())
    }

    /// Position of `tag` (by identity), searching from `start_from`.
    pub fn position(&self, tag: &Tag, start_from: usize) -> Result<Option<usize>> {
        self.check_range("start position", start_from)?;
        Ok(self.tags[start_from..]
            .iter()
            .position(|t| t.ptr_eq(tag))
            .map(|i| i + start_from))
    }

    /// Position of the first child named `name`, searching from `start_from`.
    pub fn position_of_name(&self, name: &QName, start_from: usize) -> Result<Option<usize>> {
        self.check_range("start position", start_from)?;
        Ok(self.tags[start_from..]
            .iter()
            .position(|t| t.name() == *name)
            .map(|i| i + start_from))
    }

    /// Iterates over the children in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub(crate) fn get(&self, position: usize) -> Option<&Tag> {
        self.tags.get(position)
    }

    pub(crate) fn push(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub(crate) fn remove(&mut self, tag: &Tag) -> bool {
        match self.tags.iter().position(|t| t.ptr_eq(tag)) {
            Some(i) => {
                self.tags.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn move_tag(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_range("from position", from)?;
        self.check_range("to position", to)?;
        let tag = self.tags.remove(from);
        self.tags.insert(to, tag);
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Vec<Tag> {
        std::mem::take(&mut self.tags)
    }

    fn check_range(&self, what: &str, position: usize) -> Result<()> {
        if position >= self.tags.len() {
            return Err(Error::validation(format!(
                "{} {} is out of range for {} children",
                what,
                position,
                self.tags.len()
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Order {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCategory;
    use crate::tag::{CompositeTag, SimpleTag, Tag};

    fn sample() -> (CompositeTag, Vec<Tag>) {
        let parent = CompositeTag::new("parent");
        let mut added = Vec::new();
        for name in ["evil", "evil", "pink", "evil", "green", "shaman", "good"] {
            let tag = Tag::from(SimpleTag::new(name));
            parent.add_tag(tag.clone()).unwrap();
            added.push(tag);
        }
        (parent, added)
    }

    #[test]
    fn test_navigation() {
        let (parent, added) = sample();
        let order = parent.order();
        assert_eq!(order.size(), 7);
        assert_eq!(order.tag_at(2).unwrap().name().local_part(), "pink");
        assert_eq!(order.tag_at(6).unwrap().name().local_part(), "good");
        assert_eq!(order.position(&added[4], 0).unwrap(), Some(4));
        assert_eq!(order.position(&added[0], 1).unwrap(), None);
        assert_eq!(order.position_of_name(&"evil".into(), 2).unwrap(), Some(3));
    }

    #[test]
    fn test_move() {
        let (parent, _) = sample();
        parent.move_tag(0, 6).unwrap();
        let order = parent.order();
        assert_eq!(order.tag_at(6).unwrap().name().local_part(), "evil");
        assert_eq!(order.tag_at(5).unwrap().name().local_part(), "good");
    }

    #[test]
    fn test_out_of_range_is_validation_error() {
        let (parent, _) = sample();
        let order = parent.order();
        assert_eq!(order.tag_at(7).unwrap_err().category(), ErrorCategory::Validation);
        assert!(parent.order().position_of_name(&"evil".into(), 9).is_err());
        drop(order);
        assert!(parent.move_tag(0, 7).is_err());
    }
}
