#![forbid(unsafe_code)]

//! Components and the type-keyed component map.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::Schema;
use crate::error::BoxError;
use crate::output::Props;

/// Render function behind a [`Component`].
pub type RenderFn<S> =
    dyn Fn(&Props<S>) -> Result<<S as Schema>::Node, BoxError> + Send + Sync;

/// A named, shareable rendering function from [`Props`] to a node.
///
/// Cloning is cheap; clones compare equal under [`Component::ptr_eq`].
pub struct Component<S: Schema> {
    name: Cow<'static, str>,
    render: Arc<RenderFn<S>>,
}

impl<S: Schema> Component<S> {
    /// Create a component from an infallible render function.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, render: F) -> Self
    where
        F: Fn(&Props<S>) -> S::Node + Send + Sync + 'static,
    {
        Self::try_new(name, move |props| Ok(render(props)))
    }

    /// Create a component whose render function can fail.
    pub fn try_new<F>(name: impl Into<Cow<'static, str>>, render: F) -> Self
    where
        F: Fn(&Props<S>) -> Result<S::Node, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
        }
    }

    /// Display name, used in render errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the component.
    pub fn render(&self, props: &Props<S>) -> Result<S::Node, BoxError> {
        (self.render)(props)
    }

    /// Whether both handles point at the same render function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.render, &other.render)
    }
}

impl<S: Schema> Clone for Component<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            render: Arc::clone(&self.render),
        }
    }
}

impl<S: Schema> fmt::Debug for Component<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

/// Mapping from dispatch type to component.
pub struct ComponentMap<S: Schema> {
    entries: AHashMap<S::Type, Component<S>>,
}

impl<S: Schema> ComponentMap<S> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Map `ty` to `component`, returning the previous mapping if any.
    pub fn insert(&mut self, ty: S::Type, component: Component<S>) -> Option<Component<S>> {
        self.entries.insert(ty, component)
    }

    /// Component mapped for `ty`.
    #[must_use]
    pub fn get(&self, ty: &S::Type) -> Option<&Component<S>> {
        self.entries.get(ty)
    }

    #[must_use]
    pub fn contains(&self, ty: &S::Type) -> bool {
        self.entries.contains_key(ty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all mappings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&S::Type, &Component<S>)> {
        self.entries.iter()
    }
}

impl<S: Schema> Default for ComponentMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Clone for ComponentMap<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for ComponentMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<S: Schema> FromIterator<(S::Type, Component<S>)> for ComponentMap<S> {
    fn from_iter<I: IntoIterator<Item = (S::Type, Component<S>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<S: Schema> Extend<(S::Type, Component<S>)> for ComponentMap<S> {
    fn extend<I: IntoIterator<Item = (S::Type, Component<S>)>>(&mut self, iter: I) {
        for (ty, component) in iter {
            self.entries.insert(ty, component);
        }
    }
}

/// Outcome of resolving one dispatch type.
pub enum Resolved<S: Schema> {
    /// Found in the component map.
    Mapped(Component<S>),
    /// Not mapped; the caller's default component stands in.
    Default(Component<S>),
    /// Not mapped and no default was supplied.
    Unresolved,
}

impl<S: Schema> Resolved<S> {
    /// The component to render, if one was resolved.
    #[must_use]
    pub fn component(&self) -> Option<&Component<S>> {
        match self {
            Self::Mapped(c) | Self::Default(c) => Some(c),
            Self::Unresolved => None,
        }
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }
}

impl<S: Schema> Clone for Resolved<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Mapped(c) => Self::Mapped(c.clone()),
            Self::Default(c) => Self::Default(c.clone()),
            Self::Unresolved => Self::Unresolved,
        }
    }
}

impl<S: Schema> fmt::Debug for Resolved<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapped(c) => f.debug_tuple("Mapped").field(c).finish(),
            Self::Default(c) => f.debug_tuple("Default").field(c).finish(),
            Self::Unresolved => f.write_str("Unresolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Demo;

    impl Schema for Demo {
        type Item = u8;
        type Key = usize;
        type Type = u8;
        type Context = ();
        type Props = ();
        type Node = String;
        type Meta = ();
    }

    fn label(name: &'static str) -> Component<Demo> {
        Component::new(name, move |_| name.to_string())
    }

    #[test]
    fn clones_share_identity() {
        let a = label("A");
        let b = a.clone();
        let c = label("A");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(format!("{a:?}"), "Component(\"A\")");
    }

    #[test]
    fn render_passes_props() {
        let comp = Component::<Demo>::new("Key", |p| format!("key={}", p.key));
        let out = comp.render(&Props::identity(7)).expect("render");
        assert_eq!(out, "key=7");
    }

    #[test]
    fn try_new_propagates_failure() {
        let comp = Component::<Demo>::try_new("Broken", |_| Err("nope".into()));
        let err = comp.render(&Props::identity(0)).unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(comp.name(), "Broken");
    }

    #[test]
    fn map_insert_and_lookup() {
        let mut map: ComponentMap<Demo> = [(1, label("One"))].into_iter().collect();
        assert_eq!(map.len(), 1);
        assert!(map.contains(&1));
        assert!(map.get(&2).is_none());
        assert!(map.insert(2, label("Two")).is_none());
        let replaced = map.insert(1, label("Uno")).expect("previous");
        assert_eq!(replaced.name(), "One");
        assert_eq!(map.get(&1).map(Component::name), Some("Uno"));
        assert!(!map.is_empty());
    }

    #[test]
    fn resolved_accessors() {
        let mapped = Resolved::Mapped(label("M"));
        let default = Resolved::Default(label("D"));
        let missing: Resolved<Demo> = Resolved::Unresolved;
        assert!(mapped.is_mapped());
        assert!(default.is_default());
        assert!(missing.is_unresolved());
        assert_eq!(default.component().map(Component::name), Some("D"));
        assert!(missing.component().is_none());
    }
}
