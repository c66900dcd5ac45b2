#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! Resolving the links a field class holds to an anterior field.
//!
//! [`flowtrace_field_class`] owns the data types (`Scope`, `FieldPath`,
//! `FieldLocation`, `Link`) so that a field class can carry an
//! unresolved link at construction time without this crate existing
//! yet. This crate owns the algorithm: given the four scope roots of an
//! event (packet context, event common context, event specific
//! context, event payload), walk them to resolve every
//! [`Link::UnresolvedPath`] into a concrete [`FieldPath`], and to check
//! that a field location actually reaches a field.
//!
//! The scope-visibility rule: a field in a later scope (by
//! [`Scope::VISIBILITY_ORDER`]) may reference an anterior field in an
//! earlier or the same scope; it may never reach into a later one. This
//! mirrors the fact that, at decode time, earlier scopes are fully
//! decoded before later ones begin.

use flowtrace_field_class::{FieldClass, FieldClassShape, FieldClassTag, FieldPath, Scope};
use thiserror::Error;

/// Errors raised while resolving field paths or field locations over a
/// set of scope roots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An [`flowtrace_field_class::Link::UnresolvedPath`] targets a tag
    /// that does not appear in any visible scope.
    #[error("field path target not found in any visible scope")]
    TargetNotFound,

    /// An [`flowtrace_field_class::Link::UnresolvedPath`] targets a tag
    /// that appears more than once across the visible scopes (the tree
    /// was built incorrectly: tags are meant to be unique).
    #[error("field path target found more than once across visible scopes")]
    AmbiguousTarget,

    /// The target field was found, but in a scope that is not visible
    /// from the scope the link lives in (a later scope may never be
    /// referenced from an earlier one).
    #[error("field path target is in scope {target:?}, not visible from {from:?}")]
    NotVisible {
        /// The scope the link itself lives in.
        from: Scope,
        /// The scope the target field actually lives in.
        target: Scope,
    },

    /// A [`flowtrace_field_class::FieldLocation`] names a root scope
    /// with no field class installed.
    #[error("field location root scope {0:?} has no field class")]
    MissingRoot(Scope),

    /// A [`flowtrace_field_class::FieldLocation`]'s name sequence does
    /// not reach a field (a structure member or variant option name
    /// does not exist along the path).
    #[error("field location segment {segment:?} not found at depth {depth}")]
    SegmentNotFound {
        /// The name that could not be found.
        segment: String,
        /// How many segments were successfully walked before failure.
        depth: usize,
    },
}

/// The field classes installed as the roots of the four scopes of a
/// single event, in the order an event is decoded.
///
/// Any of the context scopes may be absent (`None`) — packet context
/// and the two "common"/"specific" contexts are optional per stream or
/// event class — but [`Scope::EventPayload`] is conventionally always
/// present.
#[derive(Clone, Copy, Debug)]
pub struct ScopeRoots<'a> {
    /// The stream class's packet context field class, if any.
    pub packet_context: Option<&'a FieldClass>,
    /// The stream class's event common context field class, if any.
    pub event_common_context: Option<&'a FieldClass>,
    /// The event class's specific context field class, if any.
    pub event_specific_context: Option<&'a FieldClass>,
    /// The event class's payload field class, if any.
    pub event_payload: Option<&'a FieldClass>,
}

impl<'a> ScopeRoots<'a> {
    fn root(&self, scope: Scope) -> Option<&'a FieldClass> {
        match scope {
            Scope::PacketContext => self.packet_context,
            Scope::EventCommonContext => self.event_common_context,
            Scope::EventSpecificContext => self.event_specific_context,
            Scope::EventPayload => self.event_payload,
        }
    }

    /// The scopes visible from `from`, in [`Scope::VISIBILITY_ORDER`]
    /// (earliest first), including `from` itself.
    fn visible_from(&self, from: Scope) -> impl Iterator<Item = Scope> + '_ {
        Scope::VISIBILITY_ORDER.into_iter().filter(move |s| s.rank() <= from.rank())
    }
}

/// Finds the field class tagged `target` anywhere under `root`,
/// returning the indexes to reach it (for building a [`FieldPath`])
/// alongside a reference to the field class itself.
fn find_tag<'a>(root: &'a FieldClass, target: FieldClassTag, trail: &mut Vec<u32>) -> Option<&'a FieldClass> {
    if root.tag() == target {
        return Some(root);
    }
    match root.shape() {
        FieldClassShape::Structure(s) => {
            for (i, member) in s.members().iter().enumerate() {
                trail.push(i as u32);
                if let Some(found) = find_tag(member.field_class(), target, trail) {
                    return Some(found);
                }
                trail.pop();
            }
            None
        }
        FieldClassShape::VariantWithoutSelector(v) => {
            for (i, opt) in v.options().iter().enumerate() {
                trail.push(i as u32);
                if let Some(found) = find_tag(opt.field_class(), target, trail) {
                    return Some(found);
                }
                trail.pop();
            }
            None
        }
        _ => None,
    }
}

/// Resolves a single MIP 0 link's target tag against the scopes visible
/// from `from`, returning the [`FieldPath`] to it.
///
/// Searches only the scopes that `from` may legally reference — a
/// target found in a later, invisible scope is reported as
/// [`Error::NotVisible`] rather than silently ignored, since that is a
/// tree built in violation of the scope-visibility rule rather than a
/// missing field.
pub fn resolve_path(roots: ScopeRoots<'_>, from: Scope, target: FieldClassTag) -> Result<FieldPath, Error> {
    let mut hit: Option<(Scope, Vec<u32>)> = None;

    for scope in Scope::VISIBILITY_ORDER {
        let Some(root) = roots.root(scope) else { continue };
        let mut trail = Vec::new();
        if find_tag(root, target, &mut trail).is_some() {
            if hit.is_some() {
                return Err(Error::AmbiguousTarget);
            }
            hit = Some((scope, trail));
        }
    }

    let (scope, indexes) = hit.ok_or(Error::TargetNotFound)?;
    if scope.rank() > from.rank() {
        return Err(Error::NotVisible { from, target: scope });
    }
    Ok(FieldPath::new(scope, indexes))
}

/// Walks a [`flowtrace_field_class::FieldLocation`]'s name sequence
/// over `roots`, confirming it actually reaches a field.
///
/// Returns the resolved field class on success.
pub fn walk_location<'a>(roots: ScopeRoots<'a>, root: Scope, names: &[String]) -> Result<&'a FieldClass, Error> {
    let mut current = roots.root(root).ok_or(Error::MissingRoot(root))?;
    for (depth, name) in names.iter().enumerate() {
        current = match current.shape() {
            FieldClassShape::Structure(s) => s
                .member(name)
                .map(|m| m.field_class())
                .ok_or_else(|| Error::SegmentNotFound { segment: name.clone(), depth })?,
            FieldClassShape::VariantWithoutSelector(v) => v
                .options()
                .iter()
                .find(|o| o.name() == Some(name.as_str()))
                .map(|o| o.field_class())
                .ok_or_else(|| Error::SegmentNotFound { segment: name.clone(), depth })?,
            _ => return Err(Error::SegmentNotFound { segment: name.clone(), depth }),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_field_class::{IntegerDisplayBase, Link};

    fn payload_with_length_linked_array() -> (FieldClass, FieldClassTag) {
        let length_fc = FieldClass::new_unsigned_integer(32, IntegerDisplayBase::Decimal).unwrap();
        let length_tag = length_fc.tag();
        let array_fc = FieldClass::new_dynamic_array_without_length(FieldClass::new_bool());
        let mut payload = FieldClass::new_structure();
        payload.append_member("len", length_fc).unwrap();
        payload.append_member("items", array_fc).unwrap();
        let _ = Link::unresolved_path(length_tag);
        (payload, length_tag)
    }

    #[test]
    fn resolves_a_path_within_the_same_scope() {
        let (payload, target) = payload_with_length_linked_array();
        let roots = ScopeRoots {
            packet_context: None,
            event_common_context: None,
            event_specific_context: None,
            event_payload: Some(&payload),
        };
        let path = resolve_path(roots, Scope::EventPayload, target).unwrap();
        assert_eq!(path.root(), Scope::EventPayload);
        assert_eq!(path.indexes(), &[0]);
    }

    #[test]
    fn rejects_reference_into_a_later_scope() {
        let specific = FieldClass::new_unsigned_integer(8, IntegerDisplayBase::Decimal).unwrap();
        let target = specific.tag();
        let roots = ScopeRoots {
            packet_context: None,
            event_common_context: None,
            event_specific_context: Some(&specific),
            event_payload: None,
        };
        let err = resolve_path(roots, Scope::PacketContext, target).unwrap_err();
        assert!(matches!(err, Error::NotVisible { .. }));
    }

    #[test]
    fn missing_target_is_reported() {
        let payload = FieldClass::new_bool();
        let roots = ScopeRoots {
            packet_context: None,
            event_common_context: None,
            event_specific_context: None,
            event_payload: Some(&payload),
        };
        let err = resolve_path(roots, Scope::EventPayload, FieldClassTag::fresh()).unwrap_err();
        assert_eq!(err, Error::TargetNotFound);
    }

    #[test]
    fn walk_location_follows_structure_members() {
        let mut payload = FieldClass::new_structure();
        payload.append_member("a", FieldClass::new_bool()).unwrap();
        let roots = ScopeRoots {
            packet_context: None,
            event_common_context: None,
            event_specific_context: None,
            event_payload: Some(&payload),
        };
        let found = walk_location(roots, Scope::EventPayload, &["a".to_string()]).unwrap();
        assert!(found.is_a(flowtrace_field_class::FieldClassType::BOOL));
    }

    #[test]
    fn walk_location_reports_missing_segment() {
        let payload = FieldClass::new_structure();
        let roots = ScopeRoots {
            packet_context: None,
            event_common_context: None,
            event_specific_context: None,
            event_payload: Some(&payload),
        };
        let err = walk_location(roots, Scope::EventPayload, &["missing".to_string()]).unwrap_err();
        assert!(matches!(err, Error::SegmentNotFound { depth: 0, .. }));
    }
}
