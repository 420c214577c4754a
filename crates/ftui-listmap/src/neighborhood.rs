#![forbid(unsafe_code)]

//! Per-item views over a render pass.
//!
//! A [`Neighborhood`] is what context functions see: the item, its previous
//! and next neighbors, and the pass-wide tables (keys, types, resolved
//! components). A [`PropsNeighborhood`] adds the derived contexts and is what
//! props functions see.
//!
//! Neighbors outside the collection are `None`. Records only hand out shared
//! references, so derivation functions cannot mutate the pass inputs.

use std::ops::Deref;

use crate::Schema;
use crate::component::{ComponentMap, Resolved};

/// One item of the collection with everything resolved for it.
pub struct Neighbor<'a, S: Schema> {
    pub index: usize,
    pub data: &'a S::Item,
    pub key: &'a S::Key,
    pub ty: &'a S::Type,
    pub component: &'a Resolved<S>,
}

impl<S: Schema> Clone for Neighbor<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for Neighbor<'_, S> {}

/// Pass-wide tables shared by every record of one pass.
pub(crate) struct Tables<'a, S: Schema> {
    pub(crate) list: &'a [S::Item],
    pub(crate) keys: &'a [S::Key],
    pub(crate) types: &'a [S::Type],
    pub(crate) components: &'a [Resolved<S>],
    pub(crate) map: &'a ComponentMap<S>,
    pub(crate) meta: Option<&'a S::Meta>,
}

impl<S: Schema> Clone for Tables<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for Tables<'_, S> {}

impl<'a, S: Schema> Tables<'a, S> {
    /// Panics when `index` is out of range.
    fn entry(&self, index: usize) -> Neighbor<'a, S> {
        Neighbor {
            index,
            data: &self.list[index],
            key: &self.keys[index],
            ty: &self.types[index],
            component: &self.components[index],
        }
    }

    fn neighbor(&self, index: usize) -> Option<Neighbor<'a, S>> {
        Some(Neighbor {
            index,
            data: self.list.get(index)?,
            key: self.keys.get(index)?,
            ty: self.types.get(index)?,
            component: self.components.get(index)?,
        })
    }
}

/// Record handed to context functions.
pub struct Neighborhood<'a, S: Schema> {
    tables: Tables<'a, S>,
    current: Neighbor<'a, S>,
}

impl<S: Schema> Clone for Neighborhood<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for Neighborhood<'_, S> {}

impl<'a, S: Schema> Neighborhood<'a, S> {
    /// Build the record for an index known to be in range.
    pub(crate) fn at(tables: Tables<'a, S>, index: usize) -> Self {
        let current = tables.entry(index);
        Self { tables, current }
    }

    /// The full collection.
    #[must_use]
    pub fn list(&self) -> &'a [S::Item] {
        self.tables.list
    }

    /// Keys of every item, in collection order.
    #[must_use]
    pub fn keys(&self) -> &'a [S::Key] {
        self.tables.keys
    }

    /// Dispatch types of every item, in collection order.
    #[must_use]
    pub fn types(&self) -> &'a [S::Type] {
        self.tables.types
    }

    /// Resolved components of every item, in collection order.
    #[must_use]
    pub fn components(&self) -> &'a [Resolved<S>] {
        self.tables.components
    }

    /// The mapper's component map.
    #[must_use]
    pub fn map(&self) -> &'a ComponentMap<S> {
        self.tables.map
    }

    /// Shared metadata supplied to the pass.
    #[must_use]
    pub fn meta(&self) -> Option<&'a S::Meta> {
        self.tables.meta
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.current.index
    }

    #[must_use]
    pub fn current(&self) -> Neighbor<'a, S> {
        self.current
    }

    /// The previous item, absent for the first item.
    #[must_use]
    pub fn previous(&self) -> Option<Neighbor<'a, S>> {
        let index = self.current.index.checked_sub(1)?;
        self.tables.neighbor(index)
    }

    /// The next item, absent for the last item.
    #[must_use]
    pub fn next(&self) -> Option<Neighbor<'a, S>> {
        self.tables.neighbor(self.current.index + 1)
    }

    #[must_use]
    pub fn data(&self) -> &'a S::Item {
        self.current.data
    }

    #[must_use]
    pub fn key(&self) -> &'a S::Key {
        self.current.key
    }

    #[must_use]
    pub fn ty(&self) -> &'a S::Type {
        self.current.ty
    }

    #[must_use]
    pub fn component(&self) -> &'a Resolved<S> {
        self.current.component
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current.index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current.index + 1 == self.tables.list.len()
    }
}

/// Record handed to props functions: a [`Neighborhood`] plus derived contexts.
///
/// Dereferences to the underlying [`Neighborhood`].
pub struct PropsNeighborhood<'a, S: Schema> {
    base: Neighborhood<'a, S>,
    contexts: &'a [Option<S::Context>],
}

impl<S: Schema> Clone for PropsNeighborhood<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for PropsNeighborhood<'_, S> {}

impl<'a, S: Schema> PropsNeighborhood<'a, S> {
    pub(crate) fn new(base: Neighborhood<'a, S>, contexts: &'a [Option<S::Context>]) -> Self {
        Self { base, contexts }
    }

    /// The record without contexts.
    #[must_use]
    pub fn neighborhood(&self) -> &Neighborhood<'a, S> {
        &self.base
    }

    /// Contexts of every item; `None` where no context function applied.
    #[must_use]
    pub fn contexts(&self) -> &'a [Option<S::Context>] {
        self.contexts
    }

    /// Context of the current item.
    #[must_use]
    pub fn context(&self) -> Option<&'a S::Context> {
        self.context_at(self.base.index())
    }

    #[must_use]
    pub fn previous_context(&self) -> Option<&'a S::Context> {
        let index = self.base.index().checked_sub(1)?;
        self.context_at(index)
    }

    #[must_use]
    pub fn next_context(&self) -> Option<&'a S::Context> {
        self.context_at(self.base.index() + 1)
    }

    fn context_at(&self, index: usize) -> Option<&'a S::Context> {
        self.contexts.get(index)?.as_ref()
    }
}

impl<'a, S: Schema> Deref for PropsNeighborhood<'a, S> {
    type Target = Neighborhood<'a, S>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    struct Row;

    impl Schema for Row {
        type Item = char;
        type Key = usize;
        type Type = char;
        type Context = u32;
        type Props = ();
        type Node = ();
        type Meta = &'static str;
    }

    struct Fixture {
        list: Vec<char>,
        keys: Vec<usize>,
        types: Vec<char>,
        components: Vec<Resolved<Row>>,
        map: ComponentMap<Row>,
    }

    impl Fixture {
        fn new(list: &[char]) -> Self {
            let map: ComponentMap<Row> = [('a', Component::<Row>::new("A", |_| ()))].into_iter().collect();
            let components = list
                .iter()
                .map(|c| match map.get(c) {
                    Some(comp) => Resolved::Mapped(comp.clone()),
                    None => Resolved::Unresolved,
                })
                .collect();
            Self {
                list: list.to_vec(),
                keys: (0..list.len()).map(|i| i * 10).collect(),
                types: list.to_vec(),
                components,
                map,
            }
        }

        fn tables<'a>(&'a self, meta: Option<&'a &'static str>) -> Tables<'a, Row> {
            Tables {
                list: &self.list,
                keys: &self.keys,
                types: &self.types,
                components: &self.components,
                map: &self.map,
                meta,
            }
        }
    }

    #[test]
    fn first_item_has_no_previous() {
        let fx = Fixture::new(&['a', 'b', 'c']);
        let n = Neighborhood::at(fx.tables(None), 0);
        assert!(n.is_first());
        assert!(n.previous().is_none());
        let next = n.next().expect("next");
        assert_eq!(*next.data, 'b');
        assert_eq!(*next.key, 10);
        assert!(next.component.is_unresolved());
    }

    #[test]
    fn last_item_has_no_next() {
        let fx = Fixture::new(&['a', 'b', 'c']);
        let n = Neighborhood::at(fx.tables(None), 2);
        assert!(n.is_last());
        assert!(n.next().is_none());
        assert_eq!(n.previous().map(|p| *p.ty), Some('b'));
    }

    #[test]
    fn single_item_has_neither_neighbor() {
        let fx = Fixture::new(&['a']);
        let n = Neighborhood::at(fx.tables(None), 0);
        assert!(n.previous().is_none());
        assert!(n.next().is_none());
        assert!(n.component().is_mapped());
    }

    #[test]
    #[should_panic]
    fn at_panics_out_of_range() {
        let fx = Fixture::new(&['a']);
        let _ = Neighborhood::at(fx.tables(None), 1);
    }

    #[test]
    fn tables_and_meta_are_exposed() {
        let fx = Fixture::new(&['a', 'b']);
        let meta = "shared";
        let n = Neighborhood::at(fx.tables(Some(&meta)), 1);
        assert_eq!(n.list(), &['a', 'b']);
        assert_eq!(n.keys(), &[0, 10]);
        assert_eq!(n.types(), &['a', 'b']);
        assert_eq!(n.components().len(), 2);
        assert_eq!(n.map().len(), 1);
        assert_eq!(n.meta(), Some(&"shared"));
        assert_eq!(n.index(), 1);
        assert_eq!(*n.data(), 'b');
        assert_eq!(*n.key(), 10);
    }

    #[test]
    fn props_record_exposes_neighbor_contexts() {
        let fx = Fixture::new(&['a', 'b', 'c']);
        let contexts = vec![Some(1), None, Some(3)];
        let base = Neighborhood::at(fx.tables(None), 1);
        let n = PropsNeighborhood::new(base, &contexts);
        assert_eq!(n.context(), None);
        assert_eq!(n.previous_context(), Some(&1));
        assert_eq!(n.next_context(), Some(&3));
        assert_eq!(n.contexts().len(), 3);
        assert_eq!(n.index(), 1);

        let first = PropsNeighborhood::new(
            Neighborhood::at(fx.tables(None), 0),
            &contexts,
        );
        assert_eq!(first.context(), Some(&1));
        assert_eq!(first.previous_context(), None);
    }
}
