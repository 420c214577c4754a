#![forbid(unsafe_code)]

//! Errors produced by a list mapping pass.

use std::borrow::Cow;
use std::fmt;

/// Boxed error returned by caller-supplied derivation functions and components.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Component resolution.
    Resolve,
    /// Context derivation.
    Context,
    /// Props derivation.
    Props,
    /// Component rendering.
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Context => "context",
            Self::Props => "props",
            Self::Render => "render",
        };
        f.write_str(name)
    }
}

/// Error that aborts a render pass.
///
/// `T` is the dispatch type of the mapper's schema.
#[derive(Debug)]
pub enum MapError<T> {
    /// No component is mapped for `ty` and no default component was supplied.
    UnresolvedType {
        /// The dispatch type with no mapping.
        ty: T,
        /// Index of the first item carrying that type.
        index: usize,
    },
    /// A context function failed.
    Context { index: usize, source: BoxError },
    /// A props function failed.
    Props { index: usize, source: BoxError },
    /// A component failed to render.
    Render {
        index: usize,
        component: Cow<'static, str>,
        source: BoxError,
    },
}

impl<T> MapError<T> {
    /// Stage the error was raised in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::UnresolvedType { .. } => Stage::Resolve,
            Self::Context { .. } => Stage::Context,
            Self::Props { .. } => Stage::Props,
            Self::Render { .. } => Stage::Render,
        }
    }

    /// Index of the item that caused the failure.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::UnresolvedType { index, .. }
            | Self::Context { index, .. }
            | Self::Props { index, .. }
            | Self::Render { index, .. } => *index,
        }
    }

    /// The unresolved dispatch type, if this is an unresolved-type error.
    #[must_use]
    pub fn unresolved_type(&self) -> Option<&T> {
        match self {
            Self::UnresolvedType { ty, .. } => Some(ty),
            _ => None,
        }
    }

    /// Take the caller's original error out, if the failure came from caller code.
    pub fn into_source(self) -> Option<BoxError> {
        match self {
            Self::UnresolvedType { .. } => None,
            Self::Context { source, .. }
            | Self::Props { source, .. }
            | Self::Render { source, .. } => Some(source),
        }
    }
}

impl<T: fmt::Display> fmt::Display for MapError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedType { ty, index } => write!(
                f,
                "could not find a component mapping for type \"{ty}\" (item {index})"
            ),
            Self::Context { index, source } => {
                write!(f, "context derivation failed for item {index}: {source}")
            }
            Self::Props { index, source } => {
                write!(f, "props derivation failed for item {index}: {source}")
            }
            Self::Render {
                index,
                component,
                source,
            } => write!(
                f,
                "component {component} failed to render item {index}: {source}"
            ),
        }
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for MapError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnresolvedType { .. } => None,
            Self::Context { source, .. }
            | Self::Props { source, .. }
            | Self::Render { source, .. } => Some(source.as_ref()),
        }
    }
}
