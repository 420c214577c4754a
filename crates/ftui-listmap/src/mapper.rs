#![forbid(unsafe_code)]

//! The list mapper and its builder.
//!
//! A pass runs the stages strictly in order:
//!
//! 1. keys and types ([`ListMapper::render`] calls the key and type functions
//!    once per item, in index order),
//! 2. component resolution, followed by a fail-fast check for types with no
//!    component and no default,
//! 3. context derivation,
//! 4. props derivation, then rendering.
//!
//! Each stage only reads the collection and the outputs of earlier stages.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

use crate::Schema;
use crate::component::{Component, ComponentMap, Resolved};
use crate::error::{BoxError, MapError};
use crate::neighborhood::{Neighborhood, PropsNeighborhood, Tables};
use crate::output::{KeyedNode, Props, RenderedList};

/// Derives an item's identity from `(item, index, collection)`.
pub type KeyFn<S> = dyn Fn(&<S as Schema>::Item, usize, &[<S as Schema>::Item]) -> <S as Schema>::Key
    + Send
    + Sync;

/// Derives an item's dispatch type from `(item, index, collection)`.
pub type TypeFn<S> = dyn Fn(&<S as Schema>::Item, usize, &[<S as Schema>::Item]) -> <S as Schema>::Type
    + Send
    + Sync;

/// Derives an item's context from its [`Neighborhood`].
pub type ContextFn<S> =
    dyn Fn(&Neighborhood<'_, S>) -> Result<<S as Schema>::Context, BoxError> + Send + Sync;

/// Derives an item's props from its [`PropsNeighborhood`].
pub type PropsFn<S> =
    dyn Fn(&PropsNeighborhood<'_, S>) -> Result<<S as Schema>::Props, BoxError> + Send + Sync;

static NEXT_MAPPER_ID: AtomicU64 = AtomicU64::new(1);

fn boxed_context<S, F>(f: F) -> Box<ContextFn<S>>
where
    S: Schema,
    F: Fn(&Neighborhood<'_, S>) -> Result<S::Context, BoxError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn boxed_props<S, F>(f: F) -> Box<PropsFn<S>>
where
    S: Schema,
    F: Fn(&PropsNeighborhood<'_, S>) -> Result<S::Props, BoxError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Keys, types and resolved components of one pass.
pub(crate) struct Resolution<S: Schema> {
    pub(crate) keys: Vec<S::Key>,
    pub(crate) types: Vec<S::Type>,
    pub(crate) components: Vec<Resolved<S>>,
}

/// Renders an ordered list of heterogeneous items through type-dispatched
/// components.
///
/// Built once with [`ListMapper::builder`] and immutable afterwards. A mapper
/// holds no per-pass state, so it can be shared across threads and passes.
pub struct ListMapper<S: Schema> {
    id: u64,
    get_key: Box<KeyFn<S>>,
    get_type: Box<TypeFn<S>>,
    map: ComponentMap<S>,
    default: Option<Component<S>>,
    context_map: AHashMap<S::Type, Box<ContextFn<S>>>,
    props_map: AHashMap<S::Type, Box<PropsFn<S>>>,
    default_context: Option<Box<ContextFn<S>>>,
    default_props: Option<Box<PropsFn<S>>>,
}

impl<S: Schema> ListMapper<S> {
    /// Start building a mapper from the key and type functions.
    pub fn builder<K, T>(get_key: K, get_type: T) -> ListMapperBuilder<S>
    where
        K: Fn(&S::Item, usize, &[S::Item]) -> S::Key + Send + Sync + 'static,
        T: Fn(&S::Item, usize, &[S::Item]) -> S::Type + Send + Sync + 'static,
    {
        ListMapperBuilder {
            get_key: Box::new(get_key),
            get_type: Box::new(get_type),
            map: ComponentMap::new(),
            default: None,
            context_map: AHashMap::new(),
            props_map: AHashMap::new(),
            default_context: None,
            default_props: None,
        }
    }

    /// Unique identity of this mapper, used by [`MemoState`](crate::MemoState)
    /// to detect a configuration change.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn component_map(&self) -> &ComponentMap<S> {
        &self.map
    }

    #[must_use]
    pub fn default_component(&self) -> Option<&Component<S>> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Resolve one dispatch type the way a pass would.
    #[must_use]
    pub fn resolve(&self, ty: &S::Type) -> Resolved<S> {
        match (self.map.get(ty), &self.default) {
            (Some(component), _) => Resolved::Mapped(component.clone()),
            (None, Some(fallback)) => Resolved::Default(fallback.clone()),
            (None, None) => Resolved::Unresolved,
        }
    }

    /// Run one full pass over `list`.
    ///
    /// Either every item renders, or the first failure aborts the pass.
    ///
    /// # Errors
    ///
    /// - [`MapError::UnresolvedType`] if an item's type has no component and
    ///   no default component was supplied. No context, props or render
    ///   function runs in that case.
    /// - [`MapError::Context`], [`MapError::Props`], [`MapError::Render`] if a
    ///   caller-supplied function fails.
    pub fn render(
        &self,
        list: &[S::Item],
        meta: Option<&S::Meta>,
    ) -> crate::Result<RenderedList<S>, S::Type> {
        #[cfg(feature = "tracing")]
        let render_start = web_time::Instant::now();
        #[cfg(feature = "tracing")]
        let render_span = tracing::debug_span!(
            "listmap.render",
            items = list.len(),
            mapper = self.id,
            render_duration_us = tracing::field::Empty
        );
        #[cfg(feature = "tracing")]
        let _render_guard = render_span.enter();

        let result = self.run_pass(list, meta);

        #[cfg(feature = "tracing")]
        {
            let elapsed_us = render_start.elapsed().as_micros() as u64;
            render_span.record("render_duration_us", elapsed_us);
        }

        result
    }

    fn run_pass(
        &self,
        list: &[S::Item],
        meta: Option<&S::Meta>,
    ) -> crate::Result<RenderedList<S>, S::Type> {
        let resolution = self.resolve_list(list);
        let components = self.check_resolved(&resolution)?;
        let contexts = self.derive_contexts(list, &resolution, meta)?;
        let props = self.derive_props(list, &resolution, meta, &contexts)?;
        self.render_nodes(&components, &props)
    }

    /// Stages 1 and 2: keys, types, then components.
    pub(crate) fn resolve_list(&self, list: &[S::Item]) -> Resolution<S> {
        let keys: Vec<S::Key> = list
            .iter()
            .enumerate()
            .map(|(index, item)| (self.get_key)(item, index, list))
            .collect();
        let types: Vec<S::Type> = list
            .iter()
            .enumerate()
            .map(|(index, item)| (self.get_type)(item, index, list))
            .collect();

        #[cfg(feature = "tracing")]
        log_duplicate_keys::<S>(&keys);

        let components = types.iter().map(|ty| self.resolve(ty)).collect();
        Resolution {
            keys,
            types,
            components,
        }
    }

    /// Fail the pass on the first item with no component to render.
    ///
    /// On success, returns the component for every item in collection order.
    pub(crate) fn check_resolved<'r>(
        &self,
        resolution: &'r Resolution<S>,
    ) -> crate::Result<Vec<&'r Component<S>>, S::Type> {
        let mut components = Vec::with_capacity(resolution.components.len());
        for (index, resolved) in resolution.components.iter().enumerate() {
            let Some(component) = resolved.component() else {
                let ty = resolution.types[index].clone();

                #[cfg(feature = "tracing")]
                tracing::debug!(message = "listmap.unresolved", index, ty = %ty);

                return Err(MapError::UnresolvedType { ty, index });
            };
            components.push(component);
        }
        Ok(components)
    }

    /// Stage 3: per-item contexts. `None` where no context function applies.
    pub(crate) fn derive_contexts(
        &self,
        list: &[S::Item],
        resolution: &Resolution<S>,
        meta: Option<&S::Meta>,
    ) -> crate::Result<Vec<Option<S::Context>>, S::Type> {
        let tables = self.tables(list, resolution, meta);
        let mut contexts = Vec::with_capacity(list.len());
        for (index, ty) in resolution.types.iter().enumerate() {
            let derive = self.context_map.get(ty).or(self.default_context.as_ref());
            let context = match derive {
                Some(derive) => {
                    let record = Neighborhood::at(tables, index);
                    Some(derive(&record).map_err(|source| MapError::Context { index, source })?)
                }
                None => None,
            };
            contexts.push(context);
        }
        Ok(contexts)
    }

    /// Stage 4a: per-item props, always carrying the item's key.
    pub(crate) fn derive_props(
        &self,
        list: &[S::Item],
        resolution: &Resolution<S>,
        meta: Option<&S::Meta>,
        contexts: &[Option<S::Context>],
    ) -> crate::Result<Vec<Props<S>>, S::Type> {
        let tables = self.tables(list, resolution, meta);
        let mut props = Vec::with_capacity(list.len());
        for (index, ty) in resolution.types.iter().enumerate() {
            let key = resolution.keys[index].clone();
            let derive = self.props_map.get(ty).or(self.default_props.as_ref());
            let fields = match derive {
                Some(derive) => {
                    let base = Neighborhood::at(tables, index);
                    let record = PropsNeighborhood::new(base, contexts);
                    Some(derive(&record).map_err(|source| MapError::Props { index, source })?)
                }
                None => None,
            };
            props.push(Props { key, fields });
        }
        Ok(props)
    }

    /// Stage 4b: invoke each component with its props.
    pub(crate) fn render_nodes(
        &self,
        components: &[&Component<S>],
        props: &[Props<S>],
    ) -> crate::Result<RenderedList<S>, S::Type> {
        let mut nodes = Vec::with_capacity(props.len());
        for (index, (component, props)) in components.iter().zip(props).enumerate() {
            let node = component.render(props).map_err(|source| MapError::Render {
                index,
                component: component.name().to_owned().into(),
                source,
            })?;
            nodes.push(KeyedNode {
                key: props.key.clone(),
                node,
            });
        }
        Ok(RenderedList::from_nodes(nodes))
    }

    fn tables<'a>(
        &'a self,
        list: &'a [S::Item],
        resolution: &'a Resolution<S>,
        meta: Option<&'a S::Meta>,
    ) -> Tables<'a, S> {
        Tables {
            list,
            keys: &resolution.keys,
            types: &resolution.types,
            components: &resolution.components,
            map: &self.map,
            meta,
        }
    }
}

#[cfg(feature = "tracing")]
fn log_duplicate_keys<S: Schema>(keys: &[S::Key]) {
    let mut seen = ahash::AHashSet::with_capacity(keys.len());
    for (index, key) in keys.iter().enumerate() {
        if !seen.insert(key) {
            tracing::warn!(message = "listmap.duplicate_key", index, key = ?key);
        }
    }
}

/// Builder for [`ListMapper`].
pub struct ListMapperBuilder<S: Schema> {
    get_key: Box<KeyFn<S>>,
    get_type: Box<TypeFn<S>>,
    map: ComponentMap<S>,
    default: Option<Component<S>>,
    context_map: AHashMap<S::Type, Box<ContextFn<S>>>,
    props_map: AHashMap<S::Type, Box<PropsFn<S>>>,
    default_context: Option<Box<ContextFn<S>>>,
    default_props: Option<Box<PropsFn<S>>>,
}

impl<S: Schema> ListMapperBuilder<S> {
    /// Map `ty` to `component`.
    #[must_use]
    pub fn component(mut self, ty: S::Type, component: Component<S>) -> Self {
        self.map.insert(ty, component);
        self
    }

    /// Add several mappings at once.
    #[must_use]
    pub fn components<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = (S::Type, Component<S>)>,
    {
        self.map.extend(components);
        self
    }

    /// Replace the whole component map.
    #[must_use]
    pub fn map(mut self, map: ComponentMap<S>) -> Self {
        self.map = map;
        self
    }

    /// Component rendered for types missing from the map.
    #[must_use]
    pub fn default_component(mut self, component: Component<S>) -> Self {
        self.default = Some(component);
        self
    }

    /// Context function for items of type `ty`.
    #[must_use]
    pub fn context_for<F>(self, ty: S::Type, derive: F) -> Self
    where
        F: Fn(&Neighborhood<'_, S>) -> S::Context + Send + Sync + 'static,
    {
        self.try_context_for(ty, move |record| Ok(derive(record)))
    }

    /// Fallible context function for items of type `ty`.
    #[must_use]
    pub fn try_context_for<F>(mut self, ty: S::Type, derive: F) -> Self
    where
        F: Fn(&Neighborhood<'_, S>) -> Result<S::Context, BoxError> + Send + Sync + 'static,
    {
        self.context_map.insert(ty, boxed_context(derive));
        self
    }

    /// Context function for types with no entry of their own.
    #[must_use]
    pub fn default_context<F>(self, derive: F) -> Self
    where
        F: Fn(&Neighborhood<'_, S>) -> S::Context + Send + Sync + 'static,
    {
        self.try_default_context(move |record| Ok(derive(record)))
    }

    #[must_use]
    pub fn try_default_context<F>(mut self, derive: F) -> Self
    where
        F: Fn(&Neighborhood<'_, S>) -> Result<S::Context, BoxError> + Send + Sync + 'static,
    {
        self.default_context = Some(boxed_context(derive));
        self
    }

    /// Props function for items of type `ty`.
    #[must_use]
    pub fn props_for<F>(self, ty: S::Type, derive: F) -> Self
    where
        F: Fn(&PropsNeighborhood<'_, S>) -> S::Props + Send + Sync + 'static,
    {
        self.try_props_for(ty, move |record| Ok(derive(record)))
    }

    /// Fallible props function for items of type `ty`.
    #[must_use]
    pub fn try_props_for<F>(mut self, ty: S::Type, derive: F) -> Self
    where
        F: Fn(&PropsNeighborhood<'_, S>) -> Result<S::Props, BoxError> + Send + Sync + 'static,
    {
        self.props_map.insert(ty, boxed_props(derive));
        self
    }

    /// Props function for types with no entry of their own.
    #[must_use]
    pub fn default_props<F>(self, derive: F) -> Self
    where
        F: Fn(&PropsNeighborhood<'_, S>) -> S::Props + Send + Sync + 'static,
    {
        self.try_default_props(move |record| Ok(derive(record)))
    }

    #[must_use]
    pub fn try_default_props<F>(mut self, derive: F) -> Self
    where
        F: Fn(&PropsNeighborhood<'_, S>) -> Result<S::Props, BoxError> + Send + Sync + 'static,
    {
        self.default_props = Some(boxed_props(derive));
        self
    }

    /// Freeze the configuration.
    #[must_use]
    pub fn build(self) -> ListMapper<S> {
        ListMapper {
            id: NEXT_MAPPER_ID.fetch_add(1, Ordering::Relaxed),
            get_key: self.get_key,
            get_type: self.get_type,
            map: self.map,
            default: self.default,
            context_map: self.context_map,
            props_map: self.props_map,
            default_context: self.default_context,
            default_props: self.default_props,
        }
    }
}
