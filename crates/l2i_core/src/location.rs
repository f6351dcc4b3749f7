//! Diagnostic locations.
//!
//! A location is a dotted path into the intent (or into the composed plan)
//! with two kinds of list selector:
//!
//! - `flows[1]` addresses an element by position in the raw document. Only
//!   the validator uses it, since ids are not trustworthy before validation.
//! - `flows[id=f1]` addresses an element by its key. Every later stage uses
//!   it, because canonical specs are re-ordered by id.
//!
//! The `id=` prefix keeps the two apart for numeric keys such as multicast
//! group ids: `multicast[3]` is the fourth group, `multicast[id=3]` is
//! group 3.

use std::fmt::Display;

/// Positional selector, e.g. `flows[1]`
#[must_use]
pub fn indexed(collection: &str, index: usize) -> String {
    format!("{}[{}]", collection, index)
}

/// Keyed selector, e.g. `flows[id=f1]`
#[must_use]
pub fn keyed(collection: &str, key: impl Display) -> String {
    format!("{}[id={}]", collection, key)
}

/// A selector inside a domain of the composed plan, e.g.
/// `domains[id=A].ports[id=eth0]`
#[must_use]
pub fn in_domain(domain: &str, rest: &str) -> String {
    format!("{}.{}", keyed("domains", domain), rest)
}

/// Split a selector segment into collection and key, if it is keyed
#[must_use]
pub fn parse_keyed(segment: &str) -> Option<(&str, &str)> {
    let (collection, rest) = segment.split_once("[id=")?;
    let key = rest.strip_suffix(']')?;
    Some((collection, key))
}
