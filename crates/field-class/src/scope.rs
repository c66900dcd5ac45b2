//! Scopes, field paths/locations, and the links dependent field
//! classes hold to their anterior (length/selector) field.

use std::sync::atomic::{AtomicU64, Ordering};

/// One of the four roots a field path or field location can start
/// from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A stream class's packet context field class.
    PacketContext,
    /// A stream class's event common context field class.
    EventCommonContext,
    /// An event class's specific context field class.
    EventSpecificContext,
    /// An event class's payload field class.
    EventPayload,
}

impl Scope {
    /// The fixed visibility order, from least to most visible: a
    /// field in a later scope may see a field in an earlier scope,
    /// never the reverse (see the scope-chain rule in
    /// `flowtrace_field_location`).
    pub const VISIBILITY_ORDER: [Scope; 4] = [
        Scope::PacketContext,
        Scope::EventCommonContext,
        Scope::EventSpecificContext,
        Scope::EventPayload,
    ];

    /// The rank of this scope in [`Scope::VISIBILITY_ORDER`]; a higher
    /// rank can see every scope of a lower or equal rank.
    pub fn rank(self) -> usize {
        Self::VISIBILITY_ORDER.iter().position(|s| *s == self).expect("exhaustive")
    }
}

/// A process-wide identity assigned to every field class at
/// construction time.
///
/// Tags exist to resolve MIP 0 field-path links: a dependent field
/// class (e.g. a dynamic array's length) records the tag of its
/// anterior field at construction time, and the resolver in
/// `flowtrace_field_location` later walks the owning scopes looking
/// for the unique field class carrying that tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldClassTag(u64);

impl FieldClassTag {
    /// Allocates a fresh, process-wide unique tag.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A resolved field path: a root scope plus a sequence of structure
/// member indexes to reach the target field (MIP 0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    root: Scope,
    indexes: Vec<u32>,
}

impl FieldPath {
    /// Creates a field path from a root scope and a sequence of member
    /// indexes.
    pub fn new(root: Scope, indexes: Vec<u32>) -> Self {
        Self { root, indexes }
    }

    /// The scope this path starts from.
    pub fn root(&self) -> Scope {
        self.root
    }

    /// The member indexes to walk, in order, from the scope root.
    pub fn indexes(&self) -> &[u32] {
        &self.indexes
    }
}

/// A field location: a root scope plus a sequence of member names to
/// reach the target field (MIP >= 1). Unlike a [`FieldPath`], a field
/// location is supplied at construction time and never re-resolved;
/// its walk may descend through both structure and variant nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLocation {
    root: Scope,
    names: Vec<String>,
}

impl FieldLocation {
    /// Creates a field location from a root scope and a sequence of
    /// member names.
    pub fn new(root: Scope, names: Vec<String>) -> Self {
        Self { root, names }
    }

    /// The scope this location starts from.
    pub fn root(&self) -> Scope {
        self.root
    }

    /// The member names to walk, in order, from the scope root.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// The link a dependent field class (dynamic array/blob length,
/// option/variant selector) holds to its anterior field.
///
/// The link kind is fixed at construction: a class built with a MIP 0
/// target tag always resolves to a [`Link::Path`], one built with a
/// field location is a [`Link::Location`] forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// MIP 0: not yet resolved. Carries the tag of the target field
    /// class, to be found by walking the owning scopes once they are
    /// installed.
    UnresolvedPath {
        /// The identity of the anterior field class this link points to.
        target: FieldClassTag,
    },
    /// MIP 0: resolved to a concrete field path.
    Path(FieldPath),
    /// MIP >= 1: supplied directly at construction.
    Location(FieldLocation),
}

impl Link {
    /// Creates an unresolved MIP 0 link targeting `target`.
    pub fn unresolved_path(target: FieldClassTag) -> Self {
        Self::UnresolvedPath { target }
    }

    /// Creates a MIP >= 1 link from a field location.
    pub fn location(location: FieldLocation) -> Self {
        Self::Location(location)
    }

    /// `true` once this link has a concrete path or location.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Link::UnresolvedPath { .. })
    }

    /// The target tag of an unresolved MIP 0 link, if any.
    pub fn unresolved_target(&self) -> Option<FieldClassTag> {
        match self {
            Link::UnresolvedPath { target } => Some(*target),
            _ => None,
        }
    }

    /// Transitions an unresolved MIP 0 link to its resolved path.
    ///
    /// # Panics
    ///
    /// Panics if this link is already resolved (a field path is
    /// resolved exactly once, when its owning scope is installed).
    pub fn resolve(&mut self, path: FieldPath) {
        assert!(!self.is_resolved(), "field path link resolved more than once");
        *self = Link::Path(path);
    }

    /// The resolved field path, if this is a MIP 0 link that has been
    /// resolved.
    pub fn as_path(&self) -> Option<&FieldPath> {
        match self {
            Link::Path(p) => Some(p),
            _ => None,
        }
    }

    /// The field location, if this is a MIP >= 1 link.
    pub fn as_location(&self) -> Option<&FieldLocation> {
        match self {
            Link::Location(l) => Some(l),
            _ => None,
        }
    }
}
