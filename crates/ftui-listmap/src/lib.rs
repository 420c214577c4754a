#![forbid(unsafe_code)]

//! Type-dispatched list-to-component mapping for FrankenTUI.
//!
//! A [`ListMapper`] renders an ordered list of heterogeneous items by picking
//! a [`Component`] for each item from its *dispatch type*. Each pass runs four
//! stages in order:
//!
//! 1. keys and types are derived for every item,
//! 2. each type is resolved to a component (or the default),
//! 3. an optional per-item context is derived,
//! 4. optional per-item props are derived and the component is rendered.
//!
//! Context and props functions see the item together with its neighbors
//! through a [`Neighborhood`] record.
//!
//! # Example
//!
//! ```
//! use ftui_listmap::{Component, ListMapper, Schema};
//!
//! struct Feed;
//!
//! impl Schema for Feed {
//!     type Item = (u32, &'static str);
//!     type Key = u32;
//!     type Type = &'static str;
//!     type Context = ();
//!     type Props = String;
//!     type Node = String;
//!     type Meta = ();
//! }
//!
//! let mapper = ListMapper::<Feed>::builder(|item, _, _| item.0, |item, _, _| item.1)
//!     .component("title", Component::<Feed>::new("Title", |p| format!("# {}", p.fields.as_deref().unwrap_or(""))))
//!     .component("body", Component::<Feed>::new("Body", |p| format!("key {}", p.key)))
//!     .props_for("title", |n| format!("item {}", n.index()))
//!     .build();
//!
//! let list = [(1, "title"), (2, "body")];
//! let rendered = mapper.render(&list, None).unwrap();
//! assert_eq!(rendered.into_nodes(), vec!["# item 0".to_string(), "key 2".to_string()]);
//! ```

use std::fmt;
use std::hash::Hash;

pub mod component;
pub mod error;
pub mod mapper;
pub mod memo;
pub mod neighborhood;
pub mod output;

pub use component::{Component, ComponentMap, Resolved};
pub use error::{BoxError, MapError, Stage};
pub use mapper::{ListMapper, ListMapperBuilder};
pub use memo::{CacheStats, MemoState};
pub use neighborhood::{Neighbor, Neighborhood, PropsNeighborhood};
pub use output::{KeyedNode, Props, RenderedList};

/// The caller-defined types a [`ListMapper`] works with.
///
/// Implement this on a marker type once per kind of list.
pub trait Schema {
    /// One element of the rendered collection.
    type Item;
    /// Stable identity of an item, consumed by the host for reconciliation.
    type Key: Clone + Eq + Hash + fmt::Debug;
    /// Dispatch token used to select a component.
    type Type: Clone + Eq + Hash + fmt::Debug + fmt::Display;
    /// Auxiliary per-item value visible to props derivation.
    type Context;
    /// Computed render properties handed to a component.
    type Props;
    /// Render-tree node produced by a component.
    type Node;
    /// Shared metadata passed through to every neighborhood record.
    type Meta;
}

/// Standard result type for list mapping.
pub type Result<T, Ty> = std::result::Result<T, MapError<Ty>>;

pub mod prelude {
    pub use crate::{
        BoxError, CacheStats, Component, ComponentMap, KeyedNode, ListMapper, ListMapperBuilder,
        MapError, MemoState, Neighbor, Neighborhood, Props, PropsNeighborhood, RenderedList,
        Resolved, Schema, Stage,
    };
}
