#![forbid(unsafe_code)]

//! Render properties and the rendered list.

use std::fmt;

use crate::Schema;

/// Final properties handed to a resolved component.
///
/// The identity key is always present. `fields` holds whatever the item's
/// props function computed, or `None` when no props function applied.
pub struct Props<S: Schema> {
    /// Identity of the item, as produced by the key function.
    pub key: S::Key,
    /// Computed properties.
    pub fields: Option<S::Props>,
}

impl<S: Schema> Props<S> {
    /// Props carrying only the identity key.
    #[must_use]
    pub fn identity(key: S::Key) -> Self {
        Self { key, fields: None }
    }

    /// Props carrying the identity key and computed fields.
    #[must_use]
    pub fn with_fields(key: S::Key, fields: S::Props) -> Self {
        Self {
            key,
            fields: Some(fields),
        }
    }

    /// Whether only the identity key is present.
    #[must_use]
    pub fn is_identity_only(&self) -> bool {
        self.fields.is_none()
    }
}

impl<S: Schema> Clone for Props<S>
where
    S::Props: Clone,
{
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for Props<S>
where
    S::Props: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("key", &self.key)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<S: Schema> PartialEq for Props<S>
where
    S::Props: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

/// One rendered node with the key the host reconciles it by.
pub struct KeyedNode<S: Schema> {
    pub key: S::Key,
    pub node: S::Node,
}

impl<S: Schema> fmt::Debug for KeyedNode<S>
where
    S::Node: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedNode")
            .field("key", &self.key)
            .field("node", &self.node)
            .finish()
    }
}

impl<S: Schema> Clone for KeyedNode<S>
where
    S::Node: Clone,
{
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            node: self.node.clone(),
        }
    }
}

impl<S: Schema> PartialEq for KeyedNode<S>
where
    S::Node: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.node == other.node
    }
}

/// Output of one render pass, in collection order.
pub struct RenderedList<S: Schema> {
    nodes: Vec<KeyedNode<S>>,
}

impl<S: Schema> RenderedList<S> {
    pub(crate) fn from_nodes(nodes: Vec<KeyedNode<S>>) -> Self {
        Self { nodes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyedNode<S>> {
        self.nodes.iter()
    }

    /// Keys in render order.
    pub fn keys(&self) -> impl Iterator<Item = &S::Key> {
        self.nodes.iter().map(|n| &n.key)
    }

    /// Nodes in render order.
    pub fn nodes(&self) -> impl Iterator<Item = &S::Node> {
        self.nodes.iter().map(|n| &n.node)
    }

    /// Drop the keys and return the nodes.
    #[must_use]
    pub fn into_nodes(self) -> Vec<S::Node> {
        self.nodes.into_iter().map(|n| n.node).collect()
    }
}

impl<S: Schema> IntoIterator for RenderedList<S> {
    type Item = KeyedNode<S>;
    type IntoIter = std::vec::IntoIter<KeyedNode<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a, S: Schema> IntoIterator for &'a RenderedList<S> {
    type Item = &'a KeyedNode<S>;
    type IntoIter = std::slice::Iter<'a, KeyedNode<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl<S: Schema> fmt::Debug for RenderedList<S>
where
    S::Node: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

impl<S: Schema> PartialEq for RenderedList<S>
where
    S::Node: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}
