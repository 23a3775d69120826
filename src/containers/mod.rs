//! Labelled tree container shared by primitives, constraints and their parameters
//!
//! A [`Node`] holds a value and an ordered list of named children. Child order
//! is insertion order and defines the pre-order traversal used when a tree is
//! flattened, so two flattenings of an unchanged tree always agree.
//!
//! Children are reference counted: the same child can appear under several
//! parents (e.g. a corner point shared by two lines of a quadrilateral)
//! without copying, and cloning a tree is cheap.

mod counter;

pub use counter::KeyCounter;

use std::rc::Rc;

use crate::error::LayoutError;

/// Separator between segments of a node path
pub const SEPARATOR: char = '/';

/// A value with an ordered mapping of named child nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Node<V> {
    value: V,
    children: Vec<(String, Rc<Node<V>>)>,
}

/// One pre-order entry of a flattened tree
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<V> {
    pub path: String,
    pub value: V,
    pub child_keys: Vec<String>,
}

impl<V> Node<V> {
    /// Create a node without children
    pub fn new(value: V) -> Self {
        Self {
            value,
            children: Vec::new(),
        }
    }

    /// Create a node from a list of named children
    ///
    /// Fails if two children share a key or a key is not a valid path segment.
    pub fn with_children<K, C>(value: V, children: impl IntoIterator<Item = (K, C)>) -> Result<Self, LayoutError>
    where
        K: Into<String>,
        C: Into<Rc<Node<V>>>,
    {
        let mut node = Self::new(value);
        for (key, child) in children {
            node.add_child(key, child)?;
        }
        Ok(node)
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.children.iter().map(|(key, _)| key.as_str())
    }

    /// Direct children in insertion order
    pub fn children(&self) -> impl Iterator<Item = (&str, &Rc<Node<V>>)> + '_ {
        self.children.iter().map(|(key, child)| (key.as_str(), child))
    }

    /// Look up a direct child
    pub fn child(&self, key: &str) -> Option<&Rc<Node<V>>> {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, child)| child)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.child(key).is_some()
    }

    /// Get the node at a slash-delimited path
    ///
    /// The empty path refers to `self`.
    pub fn get(&self, path: &str) -> Result<&Node<V>, LayoutError> {
        let mut node = self;
        for (segment, span) in segments(path) {
            node = node
                .child(segment)
                .ok_or_else(|| LayoutError::missing_segment(path, segment, span))?;
        }
        Ok(node)
    }

    /// Add a direct child under `key`
    pub fn add_child(&mut self, key: impl Into<String>, child: impl Into<Rc<Node<V>>>) -> Result<(), LayoutError> {
        let key = key.into();
        validate_key(&key)?;
        if self.contains_key(&key) {
            return Err(LayoutError::duplicate(key));
        }
        self.children.push((key, child.into()));
        Ok(())
    }

    /// Replace an existing direct child, keeping its position
    pub fn replace_child(&mut self, key: &str, child: impl Into<Rc<Node<V>>>) -> Result<(), LayoutError> {
        let slot = self
            .children
            .iter_mut()
            .find(|(k, _)| k == key)
            .ok_or_else(|| LayoutError::missing_segment(key, key, 0..key.len()))?;
        slot.1 = child.into();
        Ok(())
    }

    /// Iterate over `(path, node)` pairs in pre-order, starting with `("", self)`
    ///
    /// The iterator is lazy; calling `iter_flat` again restarts the traversal.
    pub fn iter_flat(&self) -> FlatIter<'_, V> {
        FlatIter {
            stack: vec![(String::new(), self)],
        }
    }
}

impl<V: Clone> Node<V> {
    /// Get a mutable reference to the node at `path`
    ///
    /// Shared children along the path are copied before being handed out, so
    /// other parents never observe the mutation.
    pub fn get_mut(&mut self, path: &str) -> Result<&mut Node<V>, LayoutError> {
        let mut node = self;
        for (segment, span) in segments(path) {
            let slot = node
                .children
                .iter_mut()
                .find(|(k, _)| k == segment)
                .ok_or_else(|| LayoutError::missing_segment(path, segment, span))?;
            node = Rc::make_mut(&mut slot.1);
        }
        Ok(node)
    }

    /// Insert `child` at a slash-delimited path whose parent must exist
    pub fn insert(&mut self, path: &str, child: impl Into<Rc<Node<V>>>) -> Result<(), LayoutError> {
        let (parent, key) = match path.rsplit_once(SEPARATOR) {
            Some((parent, key)) => (parent, key),
            None => ("", path),
        };
        self.get_mut(parent)?.add_child(key, child)
    }
}

/// Lazy pre-order iterator over a tree
pub struct FlatIter<'a, V> {
    stack: Vec<(String, &'a Node<V>)>,
}

impl<'a, V> Iterator for FlatIter<'a, V> {
    type Item = (String, &'a Node<V>);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        for (key, child) in node.children.iter().rev() {
            self.stack.push((join(&path, key), child.as_ref()));
        }
        Some((path, node))
    }
}

/// Join a parent path and a child key
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", parent, SEPARATOR, key)
    }
}

/// Split a path into its segments with their byte spans
fn segments(path: &str) -> impl Iterator<Item = (&str, std::ops::Range<usize>)> + '_ {
    let mut offset = 0;
    path.split(SEPARATOR)
        .filter(move |_| !path.is_empty())
        .map(move |segment| {
            let span = offset..offset + segment.len();
            offset = span.end + 1;
            (segment, span)
        })
}

fn validate_key(key: &str) -> Result<(), LayoutError> {
    if key.is_empty() {
        return Err(LayoutError::construction("child key", "keys cannot be empty"));
    }
    if key.contains(SEPARATOR) {
        return Err(LayoutError::construction(
            "child key",
            format!("'{}' contains the path separator '{}'", key, SEPARATOR),
        ));
    }
    Ok(())
}

/// Flatten a tree into pre-order `(path, value, child keys)` entries
pub fn flatten<V: Clone>(tree: &Node<V>) -> Vec<FlatNode<V>> {
    tree.iter_flat()
        .map(|(path, node)| FlatNode {
            path,
            value: node.value.clone(),
            child_keys: node.keys().map(str::to_string).collect(),
        })
        .collect()
}

/// Rebuild a tree from entries produced by [`flatten`]
///
/// Fails if the entries are not a complete, consistent pre-order listing.
pub fn unflatten<V>(flat: Vec<FlatNode<V>>) -> Result<Node<V>, LayoutError> {
    let mut entries = flat.into_iter().enumerate().peekable();
    let root = unflatten_node(&mut entries, "")?;
    if let Some((index, entry)) = entries.next() {
        return Err(LayoutError::malformed(
            index,
            format!("unexpected trailing entry '{}'", entry.path),
        ));
    }
    Ok(root)
}

fn unflatten_node<V, I>(entries: &mut std::iter::Peekable<I>, expected_path: &str) -> Result<Node<V>, LayoutError>
where
    I: Iterator<Item = (usize, FlatNode<V>)>,
{
    let (index, entry) = entries.next().ok_or_else(|| {
        LayoutError::malformed(usize::MAX, format!("missing entry for '{}'", expected_path))
    })?;
    if entry.path != expected_path {
        return Err(LayoutError::malformed(
            index,
            format!("expected path '{}', found '{}'", expected_path, entry.path),
        ));
    }

    let mut node = Node::new(entry.value);
    for key in entry.child_keys {
        let child = unflatten_node(entries, &join(expected_path, &key))?;
        node.add_child(key, child)?;
    }
    Ok(node)
}

/// Apply `f` to every value, preserving the tree shape
pub fn map<V, W>(f: &impl Fn(&V) -> W, tree: &Node<V>) -> Node<W> {
    Node {
        value: f(&tree.value),
        children: tree
            .children
            .iter()
            .map(|(key, child)| (key.clone(), Rc::new(map(f, child))))
            .collect(),
    }
}

/// Bottom-up structural reduction
///
/// Each node of the result holds `reduce` folded over its own value and the
/// reduced values of its children, starting from `init`.
pub fn accumulate<A: Clone>(reduce: &impl Fn(A, A) -> A, tree: &Node<A>, init: A) -> Node<A> {
    let children: Vec<(String, Rc<Node<A>>)> = tree
        .children
        .iter()
        .map(|(key, child)| (key.clone(), Rc::new(accumulate(reduce, child, init.clone()))))
        .collect();
    let value = children
        .iter()
        .fold(reduce(init, tree.value.clone()), |acc, (_, child)| {
            reduce(acc, child.value.clone())
        });
    Node { value, children }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Node<i32> {
        let mut root = Node::new(0);
        let mut a = Node::new(1);
        a.add_child("x", Node::new(2)).unwrap();
        a.add_child("y", Node::new(3)).unwrap();
        root.add_child("a", a).unwrap();
        root.add_child("b", Node::new(4)).unwrap();
        root
    }

    #[test]
    fn test_get_nested() {
        let tree = sample();
        assert_eq!(*tree.get("a/y").unwrap().value(), 3);
        assert_eq!(*tree.get("").unwrap().value(), 0);
    }

    #[test]
    fn test_get_missing_segment() {
        let tree = sample();
        let err = tree.get("a/z").unwrap_err();
        match err {
            LayoutError::KeyResolution { segment, span, .. } => {
                assert_eq!(segment, "z");
                assert_eq!(span, 2..3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_add_child_duplicate() {
        let mut tree = sample();
        assert!(matches!(
            tree.add_child("a", Node::new(9)),
            Err(LayoutError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_add_child_rejects_separator() {
        let mut tree = sample();
        assert!(tree.add_child("c/d", Node::new(9)).is_err());
    }

    #[test]
    fn test_iter_flat_preorder() {
        let tree = sample();
        let paths: Vec<String> = tree.iter_flat().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["", "a", "a/x", "a/y", "b"]);

        // Restartable
        let again: Vec<String> = tree.iter_flat().map(|(path, _)| path).collect();
        assert_eq!(paths, again);
    }

    #[test]
    fn test_flatten_unflatten_roundtrip() {
        let tree = sample();
        let flat = flatten(&tree);
        assert_eq!(flat[1].child_keys, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(unflatten(flat).unwrap(), tree);
    }

    #[test]
    fn test_unflatten_rejects_truncated() {
        let mut flat = flatten(&sample());
        flat.pop();
        assert!(matches!(
            unflatten(flat),
            Err(LayoutError::MalformedFlatTree { .. })
        ));
    }

    #[test]
    fn test_unflatten_rejects_trailing() {
        let mut flat = flatten(&sample());
        flat.push(FlatNode {
            path: "c".to_string(),
            value: 5,
            child_keys: vec![],
        });
        assert!(unflatten(flat).is_err());
    }

    #[test]
    fn test_map_preserves_shape() {
        let doubled = map(&|v: &i32| v * 2, &sample());
        assert_eq!(*doubled.get("a/y").unwrap().value(), 6);
        assert_eq!(doubled.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_accumulate_sums_subtrees() {
        let sums = accumulate(&|a, b| a + b, &sample(), 0);
        assert_eq!(*sums.value(), 10);
        assert_eq!(*sums.get("a").unwrap().value(), 6);
        assert_eq!(*sums.get("b").unwrap().value(), 4);
    }

    #[test]
    fn test_insert_nested_copies_shared() {
        let shared = Rc::new(Node::new(7));
        let mut root = Node::new(0);
        root.add_child("p", shared.clone()).unwrap();
        root.add_child("q", shared.clone()).unwrap();
        root.insert("p/new", Node::new(8)).unwrap();

        assert!(root.get("p/new").is_ok());
        assert!(root.get("q/new").is_err());
        assert!(shared.is_empty());
    }

    #[test]
    fn test_replace_child_keeps_order() {
        let mut tree = sample();
        tree.replace_child("a", Node::new(10)).unwrap();
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(*tree.get("a").unwrap().value(), 10);
        assert!(tree.replace_child("zz", Node::new(1)).is_err());
    }
}
