//! The ordered, namespace-aware tag tree.
//!
//! A tree is made of [`SimpleTag`] leaves holding text and [`CompositeTag`]
//! nodes holding children. Both are cheap-to-clone handles onto shared nodes;
//! cloning a handle never copies the node. A composite owns its children and
//! each child keeps a weak back-reference to its parent, so a tag is attached
//! to at most one composite at a time.
//!
//! ```
//! use adaptive_xml::{CompositeTag, SimpleTag};
//!
//! let root = CompositeTag::new("root");
//! let child = SimpleTag::with_value("name", "value");
//! root.add_tag(child.clone().into()).unwrap();
//!
//! assert!(child.parent().unwrap().ptr_eq(&root));
//! assert_eq!(root.order().size(), 1);
//! ```

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::order::Order;
use crate::qname::QName;

#[derive(Debug, Default)]
struct TagCore {
    name: QName,
    attributes: IndexMap<QName, String>,
    namespaces: IndexMap<String, String>,
    parent: Weak<RefCell<CompositeNode>>,
}

impl TagCore {
    fn named(name: QName) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn reset(&mut self, name: QName) {
        self.name = name;
        self.attributes.clear();
        self.namespaces.clear();
    }
}

#[derive(Debug)]
struct SimpleNode {
    core: TagCore,
    value: String,
}

#[derive(Debug)]
struct CompositeNode {
    core: TagCore,
    composites: IndexMap<QName, Vec<CompositeTag>>,
    simples: IndexMap<QName, Vec<SimpleTag>>,
    order: Order,
}

// Deep chains would otherwise drop recursively, one frame per level.
impl Drop for CompositeNode {
    fn drop(&mut self) {
        self.simples.clear();
        self.composites.clear();
        let mut pending = self.order.take();
        while let Some(tag) = pending.pop() {
            if let Tag::Composite(composite) = tag {
                if Rc::strong_count(&composite.0) != 1 {
                    continue;
                }
                if let Ok(mut node) = composite.0.try_borrow_mut() {
                    node.simples.clear();
                    node.composites.clear();
                    pending.extend(node.order.take());
                }
            }
        }
    }
}

/// Handle to a leaf tag holding character data.
#[derive(Debug, Clone)]
pub struct SimpleTag(Rc<RefCell<SimpleNode>>);

/// Handle to a tag holding child tags.
#[derive(Debug, Clone)]
pub struct CompositeTag(Rc<RefCell<CompositeNode>>);

/// Either kind of tag.
#[derive(Debug, Clone)]
pub enum Tag {
    /// A text leaf.
    Simple(SimpleTag),
    /// A tag with children.
    Composite(CompositeTag),
}

macro_rules! core_accessors {
    ($handle:ty) => {
        impl $handle {
            /// The tag's qualified name.
            pub fn name(&self) -> QName {
                self.0.borrow().core.name.clone()
            }

            /// Renames the tag.
            ///
            /// An attached tag may only change its prefix; changing its
            /// namespace or local part is a structural error because the
            /// parent indexes children by name.
            pub fn set_name(&self, name: QName) -> Result<()> {
                let mut node = self.0.borrow_mut();
                if node.core.parent.upgrade().is_some() && node.core.name != name {
                    return Err(Error::structural(format!(
                        "cannot rename attached tag {} to {}",
                        node.core.name, name
                    )));
                }
                node.core.name = name;
                Ok(())
            }

            /// The composite this tag is attached to.
            pub fn parent(&self) -> Option<CompositeTag> {
                self.0.borrow().core.parent.upgrade().map(CompositeTag)
            }

            /// Sets an attribute, returning the previous value.
            pub fn put_attribute<V: Into<String>>(&self, name: QName, value: V) -> Option<String> {
                self.0.borrow_mut().core.attributes.insert(name, value.into())
            }

            /// Value of an attribute.
            pub fn attribute(&self, name: &QName) -> Option<String> {
                self.0.borrow().core.attributes.get(name).cloned()
            }

            /// Removes an attribute, returning its value.
            pub fn remove_attribute(&self, name: &QName) -> Option<String> {
                self.0.borrow_mut().core.attributes.shift_remove(name)
            }

            /// Snapshot of all attributes.
            pub fn attributes(&self) -> IndexMap<QName, String> {
                self.0.borrow().core.attributes.clone()
            }

            /// Replaces all attributes.
            pub fn set_attributes(&self, attributes: IndexMap<QName, String>) {
                self.0.borrow_mut().core.attributes = attributes;
            }

            /// Declares `prefix` (empty for the default namespace) on this tag.
            pub fn put_namespace<P: Into<String>, U: Into<String>>(
                &self,
                prefix: P,
                uri: U,
            ) -> Option<String> {
                self.0.borrow_mut().core.namespaces.insert(prefix.into(), uri.into())
            }

            /// URI declared for `prefix` on this tag.
            pub fn namespace(&self, prefix: &str) -> Option<String> {
                self.0.borrow().core.namespaces.get(prefix).cloned()
            }

            /// Removes a namespace declaration.
            pub fn remove_namespace(&self, prefix: &str) -> Option<String> {
                self.0.borrow_mut().core.namespaces.shift_remove(prefix)
            }

            /// Snapshot of the namespace declarations made on this tag.
            pub fn namespaces(&self) -> IndexMap<String, String> {
                self.0.borrow().core.namespaces.clone()
            }

            /// Replaces all namespace declarations.
            pub fn set_namespaces(&self, namespaces: IndexMap<String, String>) {
                self.0.borrow_mut().core.namespaces = namespaces;
            }

            fn set_parent(&self, parent: Weak<RefCell<CompositeNode>>) {
                self.0.borrow_mut().core.parent = parent;
            }
        }
    };
}

core_accessors!(SimpleTag);
core_accessors!(CompositeTag);

impl SimpleTag {
    /// Creates a detached leaf with an empty value.
    pub fn new<N: Into<QName>>(name: N) -> Self {
        Self::with_value(name, "")
    }

    /// Creates a detached leaf holding `value`.
    pub fn with_value<N: Into<QName>, V: Into<String>>(name: N, value: V) -> Self {
        SimpleTag(Rc::new(RefCell::new(SimpleNode {
            core: TagCore::named(name.into()),
            value: value.into(),
        })))
    }

    /// The text value.
    pub fn value(&self) -> String {
        self.0.borrow().value.clone()
    }

    /// Replaces the text value.
    pub fn set_value<V: Into<String>>(&self, value: V) {
        self.0.borrow_mut().value = value.into();
    }

    /// Returns `true` if both handles point at the same tag.
    pub fn ptr_eq(&self, other: &SimpleTag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Detaches the tag and gives it a fresh identity and no content.
    pub(crate) fn reset(&self, name: QName) {
        self.detach();
        let mut node = self.0.borrow_mut();
        node.core.reset(name);
        node.value.clear();
    }

    fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_tag(&Tag::Simple(self.clone()));
        }
    }
}

impl CompositeTag {
    /// Creates a detached composite with no children.
    pub fn new<N: Into<QName>>(name: N) -> Self {
        CompositeTag(Rc::new(RefCell::new(CompositeNode {
            core: TagCore::named(name.into()),
            composites: IndexMap::new(),
            simples: IndexMap::new(),
            order: Order::default(),
        })))
    }

    /// Returns `true` if both handles point at the same tag.
    pub fn ptr_eq(&self, other: &CompositeTag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Attaches `tag` as the last child.
    ///
    /// The tag is first detached from its current parent, which may be this
    /// composite, in which case it moves to the end. Fails with a structural
    /// error if a child of the other kind already uses the same name, or if
    /// `tag` is this composite or one of its ancestors.
    pub fn add_tag(&self, tag: Tag) -> Result<bool> {
        let name = tag.name();
        if name.is_empty() {
            return Err(Error::validation("tag name has an empty local part"));
        }

        {
            let node = self.0.borrow();
            let clash = match &tag {
                Tag::Simple(_) => node.composites.contains_key(&name),
                Tag::Composite(_) => node.simples.contains_key(&name),
            };
            if clash {
                return Err(Error::structural(format!(
                    "{} already holds a {} child named {}",
                    node.core.name,
                    if tag.is_simple() { "composite" } else { "simple" },
                    name
                )));
            }
        }

        if let Tag::Composite(candidate) = &tag {
            if candidate.ptr_eq(self)
                || (candidate.child_count() > 0 && self.has_ancestor(candidate))
            {
                return Err(Error::structural(format!(
                    "cannot attach {} beneath itself",
                    name
                )));
            }
        }

        if let Some(previous) = tag.parent() {
            previous.remove_tag(&tag);
        }
        tag.set_parent(Rc::downgrade(&self.0));

        let mut node = self.0.borrow_mut();
        node.order.push(tag.clone());
        match tag {
            Tag::Simple(simple) => node.simples.entry(name).or_default().push(simple),
            Tag::Composite(composite) => node.composites.entry(name).or_default().push(composite),
        }
        Ok(true)
    }

    fn has_ancestor(&self, candidate: &CompositeTag) -> bool {
        let mut cursor = self.parent();
        while let Some(ancestor) = cursor {
            if ancestor.ptr_eq(candidate) {
                return true;
            }
            cursor = ancestor.parent();
        }
        false
    }

    /// Detaches one specific child. Returns `false` if it was not a child.
    pub fn remove_tag(&self, tag: &Tag) -> bool {
        let name = tag.name();
        let removed = {
            let mut node = self.0.borrow_mut();
            let grouped = match tag {
                Tag::Simple(simple) => remove_from_group(&mut node.simples, &name, |t: &SimpleTag| t.ptr_eq(simple)),
                Tag::Composite(composite) => {
                    remove_from_group(&mut node.composites, &name, |t: &CompositeTag| {
                        t.ptr_eq(composite)
                    })
                }
            };
            grouped && node.order.remove(tag)
        };
        if removed {
            tag.set_parent(Weak::new());
        }
        removed
    }

    /// Removes children named `name`.
    ///
    /// `count == 0` removes all of them, a positive count removes that many
    /// from the front, a negative count that many from the back. Returns the
    /// number removed.
    pub fn remove_tags_by_name(&self, name: &QName, count: isize) -> Result<usize> {
        check_name(name)?;

        let removed: Vec<Tag> = {
            let mut node = self.0.borrow_mut();
            let removed: Vec<Tag> = if let Some(group) = node.simples.get_mut(name) {
                drain_counted(group, count).into_iter().map(Tag::Simple).collect()
            } else if let Some(group) = node.composites.get_mut(name) {
                drain_counted(group, count).into_iter().map(Tag::Composite).collect()
            } else {
                Vec::new()
            };
            if node.simples.get(name).is_some_and(Vec::is_empty) {
                node.simples.shift_remove(name);
            }
            if node.composites.get(name).is_some_and(Vec::is_empty) {
                node.composites.shift_remove(name);
            }
            for tag in &removed {
                node.order.remove(tag);
            }
            removed
        };

        for tag in &removed {
            tag.set_parent(Weak::new());
        }
        Ok(removed.len())
    }

    /// Detaches every child.
    pub fn remove_all_tags(&self) {
        let removed = {
            let mut node = self.0.borrow_mut();
            node.simples.clear();
            node.composites.clear();
            node.order.take()
        };
        for tag in &removed {
            tag.set_parent(Weak::new());
        }
    }

    /// First composite child named `name`.
    pub fn composite_tag_by_name(&self, name: &QName) -> Result<Option<CompositeTag>> {
        check_name(name)?;
        Ok(self
            .0
            .borrow()
            .composites
            .get(name)
            .and_then(|group| group.first().cloned()))
    }

    /// First simple child named `name`.
    pub fn simple_tag_by_name(&self, name: &QName) -> Result<Option<SimpleTag>> {
        check_name(name)?;
        Ok(self
            .0
            .borrow()
            .simples
            .get(name)
            .and_then(|group| group.first().cloned()))
    }

    /// Every composite child named `name`, in document order.
    pub fn all_composite_tags_by_name(&self, name: &QName) -> Result<Vec<CompositeTag>> {
        check_name(name)?;
        Ok(self.0.borrow().composites.get(name).cloned().unwrap_or_default())
    }

    /// Every simple child named `name`, in document order.
    pub fn all_simple_tags_by_name(&self, name: &QName) -> Result<Vec<SimpleTag>> {
        check_name(name)?;
        Ok(self.0.borrow().simples.get(name).cloned().unwrap_or_default())
    }

    /// Every composite child, grouped by name.
    pub fn all_composite_tags(&self) -> Vec<CompositeTag> {
        self.0.borrow().composites.values().flatten().cloned().collect()
    }

    /// Every simple child, grouped by name.
    pub fn all_simple_tags(&self) -> Vec<SimpleTag> {
        self.0.borrow().simples.values().flatten().cloned().collect()
    }

    /// Snapshot of all children in document order.
    pub fn children(&self) -> Vec<Tag> {
        self.0.borrow().order.iter().cloned().collect()
    }

    /// Child at `position` in document order, `None` past the end.
    pub fn child_at(&self, position: usize) -> Option<Tag> {
        self.0.borrow().order.get(position).cloned()
    }

    /// Number of attached children.
    pub fn child_count(&self) -> usize {
        self.0.borrow().order.size()
    }

    /// Read access to the document order.
    ///
    /// The returned guard must be dropped before the composite is mutated.
    pub fn order(&self) -> Ref<'_, Order> {
        Ref::map(self.0.borrow(), |node| &node.order)
    }

    /// Moves the child at `from` to `to` in document order.
    pub fn move_tag(&self, from: usize, to: usize) -> Result<()> {
        self.0.borrow_mut().order.move_tag(from, to)
    }

    /// Detaches the tag, clears its children and gives it a fresh identity.
    pub(crate) fn reset(&self, name: QName) {
        if let Some(parent) = self.parent() {
            parent.remove_tag(&Tag::Composite(self.clone()));
        }
        self.remove_all_tags();
        self.0.borrow_mut().core.reset(name);
    }
}

fn check_name(name: &QName) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("tag name has an empty local part"));
    }
    Ok(())
}

fn remove_from_group<T, F>(groups: &mut IndexMap<QName, Vec<T>>, name: &QName, is_target: F) -> bool
where
    F: Fn(&T) -> bool,
{
    let Some(group) = groups.get_mut(name) else {
        return false;
    };
    let Some(index) = group.iter().position(is_target) else {
        return false;
    };
    group.remove(index);
    if group.is_empty() {
        groups.shift_remove(name);
    }
    true
}

fn drain_counted<T>(group: &mut Vec<T>, count: isize) -> Vec<T> {
    let n = count.unsigned_abs().min(group.len());
    match count {
        0 => std::mem::take(group),
        c if c > 0 => group.drain(..n).collect(),
        _ => {
            let start = group.len() - n;
            group.drain(start..).collect()
        }
    }
}

impl Tag {
    /// The tag's qualified name.
    pub fn name(&self) -> QName {
        match self {
            Tag::Simple(t) => t.name(),
            Tag::Composite(t) => t.name(),
        }
    }

    /// The composite this tag is attached to.
    pub fn parent(&self) -> Option<CompositeTag> {
        match self {
            Tag::Simple(t) => t.parent(),
            Tag::Composite(t) => t.parent(),
        }
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> IndexMap<QName, String> {
        match self {
            Tag::Simple(t) => t.attributes(),
            Tag::Composite(t) => t.attributes(),
        }
    }

    /// Snapshot of the namespace declarations.
    pub fn namespaces(&self) -> IndexMap<String, String> {
        match self {
            Tag::Simple(t) => t.namespaces(),
            Tag::Composite(t) => t.namespaces(),
        }
    }

    /// Returns `true` for a leaf.
    pub fn is_simple(&self) -> bool {
        matches!(self, Tag::Simple(_))
    }

    /// The leaf handle, if this is one.
    pub fn as_simple(&self) -> Option<&SimpleTag> {
        match self {
            Tag::Simple(t) => Some(t),
            Tag::Composite(_) => None,
        }
    }

    /// The composite handle, if this is one.
    pub fn as_composite(&self) -> Option<&CompositeTag> {
        match self {
            Tag::Composite(t) => Some(t),
            Tag::Simple(_) => None,
        }
    }

    /// Returns `true` if both handles point at the same tag.
    pub fn ptr_eq(&self, other: &Tag) -> bool {
        match (self, other) {
            (Tag::Simple(a), Tag::Simple(b)) => a.ptr_eq(b),
            (Tag::Composite(a), Tag::Composite(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn set_parent(&self, parent: Weak<RefCell<CompositeNode>>) {
        match self {
            Tag::Simple(t) => t.set_parent(parent),
            Tag::Composite(t) => t.set_parent(parent),
        }
    }
}

impl From<SimpleTag> for Tag {
    fn from(tag: SimpleTag) -> Self {
        Tag::Simple(tag)
    }
}

impl From<CompositeTag> for Tag {
    fn from(tag: CompositeTag) -> Self {
        Tag::Composite(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn names(parent: &CompositeTag) -> Vec<String> {
        parent
            .children()
            .iter()
            .map(|t| t.name().local_part().to_string())
            .collect()
    }

    fn filled() -> CompositeTag {
        let parent = CompositeTag::new("parent");
        for (i, name) in ["a", "b", "a", "c", "a"].iter().enumerate() {
            let tag = SimpleTag::with_value(*name, i.to_string());
            parent.add_tag(tag.into()).unwrap();
        }
        parent
    }

    #[test]
    fn test_order_tracks_insertion() {
        let parent = filled();
        assert_eq!(names(&parent), ["a", "b", "a", "c", "a"]);
        assert_eq!(parent.all_simple_tags_by_name(&"a".into()).unwrap().len(), 3);
        assert_eq!(parent.simple_tag_by_name(&"a".into()).unwrap().unwrap().value(), "0");
    }

    #[test]
    fn test_remove_first_n() {
        let parent = filled();
        assert_eq!(parent.remove_tags_by_name(&"a".into(), 2).unwrap(), 2);
        assert_eq!(names(&parent), ["b", "c", "a"]);
        assert_eq!(parent.simple_tag_by_name(&"a".into()).unwrap().unwrap().value(), "4");
    }

    #[test]
    fn test_remove_last_n() {
        let parent = filled();
        let first = parent.simple_tag_by_name(&"a".into()).unwrap().unwrap();
        assert_eq!(parent.remove_tags_by_name(&"a".into(), -5).unwrap(), 3);
        assert_eq!(names(&parent), ["b", "c"]);
        assert!(first.parent().is_none());

        let parent = filled();
        assert_eq!(parent.remove_tags_by_name(&"a".into(), -1).unwrap(), 1);
        assert_eq!(names(&parent), ["a", "b", "a", "c"]);
    }

    #[test]
    fn test_remove_all_by_name() {
        let parent = filled();
        assert_eq!(parent.remove_tags_by_name(&"a".into(), 0).unwrap(), 3);
        assert_eq!(parent.order().size(), 2);
        assert!(parent.simple_tag_by_name(&"a".into()).unwrap().is_none());
        assert_eq!(parent.remove_tags_by_name(&"missing".into(), 0).unwrap(), 0);
    }

    #[test]
    fn test_empty_name_lookup_is_validation_error() {
        let parent = filled();
        let err = parent.simple_tag_by_name(&QName::local("")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_naming_constraint() {
        let parent = CompositeTag::new("parent");
        parent.add_tag(SimpleTag::new("x").into()).unwrap();
        let err = parent.add_tag(CompositeTag::new("x").into()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert_eq!(parent.order().size(), 1);

        let parent = CompositeTag::new("parent");
        parent.add_tag(CompositeTag::new("y").into()).unwrap();
        assert!(parent.add_tag(SimpleTag::new("y").into()).is_err());
    }

    #[test]
    fn test_reattach_detaches_from_previous_parent() {
        let first = CompositeTag::new("first");
        let second = CompositeTag::new("second");
        let sibling = SimpleTag::new("leaf");
        let moved = SimpleTag::new("leaf");
        first.add_tag(sibling.clone().into()).unwrap();
        first.add_tag(moved.clone().into()).unwrap();

        second.add_tag(moved.clone().into()).unwrap();

        assert!(moved.parent().unwrap().ptr_eq(&second));
        assert_eq!(first.order().size(), 1);
        assert!(first.children()[0].ptr_eq(&sibling.into()));
        assert_eq!(second.order().size(), 1);
    }

    #[test]
    fn test_readd_moves_to_end() {
        let parent = filled();
        let b = parent.simple_tag_by_name(&"b".into()).unwrap().unwrap();
        parent.add_tag(b.into()).unwrap();
        assert_eq!(names(&parent), ["a", "a", "c", "a", "b"]);
    }

    #[test]
    fn test_cycles_rejected() {
        let outer = CompositeTag::new("outer");
        let inner = CompositeTag::new("inner");
        outer.add_tag(inner.clone().into()).unwrap();
        assert!(inner.add_tag(outer.clone().into()).is_err());
        assert!(outer.add_tag(outer.clone().into()).is_err());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let parent = filled();
        let mut snapshot = parent.all_simple_tags();
        snapshot.clear();
        assert_eq!(parent.all_simple_tags().len(), 5);
        let mut attrs = parent.attributes();
        attrs.insert(QName::local("x"), "1".to_string());
        assert!(parent.attributes().is_empty());
    }

    #[test]
    fn test_remove_all_tags() {
        let parent = filled();
        let first = parent.child_at(0).unwrap();
        parent.remove_all_tags();
        assert_eq!(parent.child_count(), 0);
        assert!(parent.all_simple_tags().is_empty());
        assert!(first.parent().is_none());
    }

    #[test]
    fn test_deep_chain_drops_without_recursion() {
        let root = CompositeTag::new("n");
        let mut cursor = root.clone();
        for _ in 0..100_000 {
            let child = CompositeTag::new("n");
            cursor.add_tag(child.clone().into()).unwrap();
            cursor = child;
        }
        cursor.add_tag(SimpleTag::with_value("v", "x").into()).unwrap();
        drop(cursor);
        assert_eq!(root.child_count(), 1);
        drop(root);
    }

    #[test]
    fn test_dropped_parent_keeps_shared_children() {
        let parent = CompositeTag::new("parent");
        let child = CompositeTag::new("child");
        child.add_tag(SimpleTag::with_value("v", "1").into()).unwrap();
        parent.add_tag(child.clone().into()).unwrap();
        drop(parent);
        assert!(child.parent().is_none());
        assert_eq!(child.child_count(), 1);
    }

    #[test]
    fn test_childless_composite_attaches_below_deep_chain() {
        let root = CompositeTag::new("root");
        let mut cursor = root.clone();
        for _ in 0..1_000 {
            let child = CompositeTag::new("n");
            cursor.add_tag(child.clone().into()).unwrap();
            cursor = child;
        }
        let leaf = CompositeTag::new("leaf");
        cursor.add_tag(leaf.clone().into()).unwrap();
        assert!(leaf.add_tag(root.clone().into()).is_err());
        assert!(leaf.add_tag(leaf.clone().into()).is_err());
    }

    #[test]
    fn test_rename_attached_tag() {
        let parent = CompositeTag::new("parent");
        let child = SimpleTag::new(QName::new("urn:a", "x"));
        parent.add_tag(child.clone().into()).unwrap();
        assert!(child.set_name(QName::with_prefix("urn:a", "x", "a")).is_ok());
        assert!(child.set_name(QName::local("y")).is_err());
        parent.remove_tag(&child.clone().into());
        assert!(child.set_name(QName::local("y")).is_ok());
    }
}
