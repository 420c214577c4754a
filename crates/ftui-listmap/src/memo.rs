#![forbid(unsafe_code)]

//! Staged memoization of list mapping passes.
//!
//! [`MemoState`] remembers what the last pass derived and which inputs it was
//! derived from. Inputs are compared by identity: the collection and meta by
//! `Arc` pointer, the mapper by [`ListMapper::id`]. On the next
//! [`ListMapper::render_memo`]:
//!
//! - a different collection or mapper recomputes every stage,
//! - a different meta keeps keys, types and components but recomputes
//!   contexts and props,
//! - identical inputs reuse every derived stage and only re-render.
//!
//! Nodes are rendered fresh on every pass.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::Schema;
use crate::mapper::{ListMapper, Resolution};
use crate::output::{Props, RenderedList};

/// Hit/miss counters of a [`MemoState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Passes that reused every derived stage.
    pub hits: u64,
    /// Passes that reused keys, types and components only.
    pub partial_hits: u64,
    /// Passes that recomputed everything.
    pub misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
enum Lookup {
    Hit,
    MetaChanged,
    Miss(MissReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissReason {
    Empty,
    MapperChanged,
    ListChanged,
}

struct Derived<S: Schema> {
    contexts: Vec<Option<S::Context>>,
    props: Vec<Props<S>>,
}

/// Cached stages of the last successful pass.
pub struct MemoState<S: Schema> {
    mapper_id: Option<u64>,
    list: Option<Arc<[S::Item]>>,
    meta: Option<Arc<S::Meta>>,
    resolution: Option<Resolution<S>>,
    derived: Option<Derived<S>>,
    stats: CacheStats,
}

impl<S: Schema> Default for MemoState<S> {
    fn default() -> Self {
        Self {
            mapper_id: None,
            list: None,
            meta: None,
            resolution: None,
            derived: None,
            stats: CacheStats::default(),
        }
    }
}

impl<S: Schema> fmt::Debug for MemoState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoState")
            .field("mapper_id", &self.mapper_id)
            .field("items", &self.list.as_ref().map(|l| l.len()))
            .field("has_meta", &self.meta.is_some())
            .field("cached", &self.derived.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<S: Schema> MemoState<S> {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached stage; the next pass recomputes from scratch.
    ///
    /// Counters are kept.
    pub fn invalidate(&mut self) {
        self.mapper_id = None;
        self.list = None;
        self.meta = None;
        self.resolution = None;
        self.derived = None;
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.derived.is_none()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Keys cached from the last successful pass.
    #[must_use]
    pub fn keys(&self) -> Option<&[S::Key]> {
        self.resolution.as_ref().map(|r| r.keys.as_slice())
    }

    /// Contexts cached from the last successful pass.
    #[must_use]
    pub fn contexts(&self) -> Option<&[Option<S::Context>]> {
        self.derived.as_ref().map(|d| d.contexts.as_slice())
    }

    /// Props cached from the last successful pass.
    #[must_use]
    pub fn props(&self) -> Option<&[Props<S>]> {
        self.derived.as_ref().map(|d| d.props.as_slice())
    }

    fn lookup(&self, mapper_id: u64, list: &Arc<[S::Item]>, meta: Option<&Arc<S::Meta>>) -> Lookup {
        if self.resolution.is_none() {
            return Lookup::Miss(MissReason::Empty);
        }
        if self.mapper_id != Some(mapper_id) {
            return Lookup::Miss(MissReason::MapperChanged);
        }
        if !self.list.as_ref().is_some_and(|cached| Arc::ptr_eq(cached, list)) {
            return Lookup::Miss(MissReason::ListChanged);
        }
        let meta_same = match (&self.meta, meta) {
            (None, None) => true,
            (Some(cached), Some(meta)) => Arc::ptr_eq(cached, meta),
            _ => false,
        };
        if meta_same && self.derived.is_some() {
            Lookup::Hit
        } else {
            Lookup::MetaChanged
        }
    }

    fn record(&mut self, lookup: Lookup) {
        match lookup {
            Lookup::Hit => self.stats.hits += 1,
            Lookup::MetaChanged => self.stats.partial_hits += 1,
            Lookup::Miss(_) => self.stats.misses += 1,
        }
    }
}

impl<S: Schema> ListMapper<S> {
    /// Run a pass, reusing stages cached in `state` when their inputs are
    /// unchanged.
    ///
    /// Produces the same output as [`ListMapper::render`] for the same inputs.
    /// A failed pass leaves `state` empty.
    ///
    /// # Errors
    ///
    /// Same as [`ListMapper::render`].
    pub fn render_memo(
        &self,
        list: &Arc<[S::Item]>,
        meta: Option<&Arc<S::Meta>>,
        state: &mut MemoState<S>,
    ) -> crate::Result<RenderedList<S>, S::Type> {
        let lookup = state.lookup(self.id(), list, meta);
        state.record(lookup);

        #[cfg(feature = "tracing")]
        match lookup {
            Lookup::Hit => trace!(message = "listmap.memo", mapper = self.id(), outcome = "hit"),
            Lookup::MetaChanged => debug!(
                message = "listmap.memo",
                mapper = self.id(),
                outcome = "partial",
                reason = "meta_changed"
            ),
            Lookup::Miss(reason) => debug!(
                message = "listmap.memo",
                mapper = self.id(),
                outcome = "miss",
                reason = ?reason
            ),
        }

        let result = self.render_staged(list, meta, state, lookup);
        if result.is_err() {
            state.invalidate();
        }
        result
    }

    fn render_staged(
        &self,
        list: &Arc<[S::Item]>,
        meta: Option<&Arc<S::Meta>>,
        state: &mut MemoState<S>,
        lookup: Lookup,
    ) -> crate::Result<RenderedList<S>, S::Type> {
        let resolution = match state.resolution.take() {
            Some(cached) if !matches!(lookup, Lookup::Miss(_)) => cached,
            _ => self.resolve_list(list),
        };
        let components = self.check_resolved(&resolution)?;

        let derived = match state.derived.take() {
            Some(cached) if lookup == Lookup::Hit => cached,
            _ => {
                let meta_ref = meta.map(|m| &**m);
                let contexts = self.derive_contexts(list, &resolution, meta_ref)?;
                let props = self.derive_props(list, &resolution, meta_ref, &contexts)?;
                Derived { contexts, props }
            }
        };

        let rendered = self.render_nodes(&components, &derived.props)?;

        state.mapper_id = Some(self.id());
        state.list = Some(Arc::clone(list));
        state.meta = meta.cloned();
        state.resolution = Some(resolution);
        state.derived = Some(derived);
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::error::MapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Words;

    impl Schema for Words {
        type Item = &'static str;
        type Key = usize;
        type Type = usize;
        type Context = usize;
        type Props = String;
        type Node = String;
        type Meta = String;
    }

    struct Counters {
        keys: Arc<AtomicUsize>,
        contexts: Arc<AtomicUsize>,
        props: Arc<AtomicUsize>,
    }

    fn counted_mapper() -> (ListMapper<Words>, Counters) {
        let counters = Counters {
            keys: Arc::new(AtomicUsize::new(0)),
            contexts: Arc::new(AtomicUsize::new(0)),
            props: Arc::new(AtomicUsize::new(0)),
        };
        let keys = Arc::clone(&counters.keys);
        let contexts = Arc::clone(&counters.contexts);
        let props = Arc::clone(&counters.props);
        let mapper = ListMapper::<Words>::builder(
            move |_, index, _| {
                keys.fetch_add(1, Ordering::SeqCst);
                index
            },
            |item, _, _| item.len(),
        )
        .default_component(Component::<Words>::new("Word", |p| {
            p.fields.clone().unwrap_or_default()
        }))
        .default_context(move |record| {
            contexts.fetch_add(1, Ordering::SeqCst);
            record.data().len()
        })
        .default_props(move |record| {
            props.fetch_add(1, Ordering::SeqCst);
            let suffix = record.meta().map(String::as_str).unwrap_or("");
            format!("{}{}{}", record.data(), record.context().copied().unwrap_or(0), suffix)
        })
        .build();
        (mapper, counters)
    }

    fn list(words: &[&'static str]) -> Arc<[&'static str]> {
        Arc::from(words.to_vec())
    }

    #[test]
    fn identical_inputs_hit() {
        let (mapper, counters) = counted_mapper();
        let items = list(&["ab", "c"]);
        let mut state = MemoState::new();

        let first = mapper.render_memo(&items, None, &mut state).expect("render");
        let second = mapper.render_memo(&items, None, &mut state).expect("render");

        assert_eq!(first, second);
        assert_eq!(counters.keys.load(Ordering::SeqCst), 2);
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 2);
        assert_eq!(counters.props.load(Ordering::SeqCst), 2);
        assert_eq!(
            state.stats(),
            CacheStats {
                hits: 1,
                partial_hits: 0,
                misses: 1
            }
        );
    }

    #[test]
    fn new_collection_misses_even_if_equal() {
        let (mapper, counters) = counted_mapper();
        let mut state = MemoState::new();
        mapper
            .render_memo(&list(&["a"]), None, &mut state)
            .expect("render");
        mapper
            .render_memo(&list(&["a"]), None, &mut state)
            .expect("render");
        assert_eq!(counters.keys.load(Ordering::SeqCst), 2);
        assert_eq!(state.stats().misses, 2);
    }

    #[test]
    fn meta_change_rederives_only_contexts_and_props() {
        let (mapper, counters) = counted_mapper();
        let items = list(&["ab"]);
        let mut state = MemoState::new();
        let bang = Arc::new("!".to_string());

        let plain = mapper.render_memo(&items, None, &mut state).expect("render");
        let loud = mapper
            .render_memo(&items, Some(&bang), &mut state)
            .expect("render");

        assert_eq!(plain.into_nodes(), vec!["ab2"]);
        assert_eq!(loud.into_nodes(), vec!["ab2!"]);
        assert_eq!(counters.keys.load(Ordering::SeqCst), 1);
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 2);
        assert_eq!(counters.props.load(Ordering::SeqCst), 2);
        assert_eq!(state.stats().partial_hits, 1);
    }

    #[test]
    fn mapper_change_misses() {
        let (first, _) = counted_mapper();
        let (second, counters) = counted_mapper();
        let items = list(&["a", "b"]);
        let mut state = MemoState::new();
        first.render_memo(&items, None, &mut state).expect("render");
        second.render_memo(&items, None, &mut state).expect("render");
        assert_eq!(counters.keys.load(Ordering::SeqCst), 2);
        assert_eq!(state.stats().misses, 2);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let (mapper, counters) = counted_mapper();
        let items = list(&["a"]);
        let mut state = MemoState::new();
        mapper.render_memo(&items, None, &mut state).expect("render");
        assert!(!state.is_empty());
        state.invalidate();
        assert!(state.is_empty());
        mapper.render_memo(&items, None, &mut state).expect("render");
        assert_eq!(counters.keys.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cached_stages_are_inspectable() {
        let (mapper, _) = counted_mapper();
        let items = list(&["xyz", "q"]);
        let mut state = MemoState::new();
        mapper.render_memo(&items, None, &mut state).expect("render");
        assert_eq!(state.keys(), Some(&[0, 1][..]));
        assert_eq!(state.contexts(), Some(&[Some(3), Some(1)][..]));
        let props = state.props().expect("props");
        assert_eq!(props[0].fields.as_deref(), Some("xyz3"));
    }

    #[test]
    fn failed_pass_leaves_state_empty() {
        let mapper = ListMapper::<Words>::builder(|_, index, _| index, |item, _, _| item.len())
            .component(1, Component::<Words>::new("One", |_| "one".to_string()))
            .build();
        let mut state = MemoState::new();

        let ok = list(&["a"]);
        mapper.render_memo(&ok, None, &mut state).expect("render");
        assert!(!state.is_empty());

        let bad = list(&["a", "abc"]);
        let err = mapper.render_memo(&bad, None, &mut state).unwrap_err();
        assert!(matches!(err, MapError::UnresolvedType { ty: 3, index: 1 }));
        assert!(state.is_empty());
    }

    #[test]
    fn memo_matches_plain_render() {
        let (mapper, _) = counted_mapper();
        let items = list(&["one", "two", "three"]);
        let meta = Arc::new("?".to_string());
        let mut state = MemoState::new();
        let memo = mapper
            .render_memo(&items, Some(&meta), &mut state)
            .expect("render");
        let plain = mapper.render(&items, Some(&*meta)).expect("render");
        assert_eq!(memo, plain);
    }
}
