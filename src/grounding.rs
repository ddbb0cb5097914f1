//! Groundings: what pattern variables and clauses were bound to.

use crate::arena::Handle;
use crate::atomspace::AtomSpace;
use crate::error::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Value bound to a variable, a glob or a pattern term.
///
/// Globs bind to a (possibly empty) ordered run of atoms; everything else
/// binds to a single atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Binding {
    Atom(Handle),
    Seq(Vec<Handle>),
}

impl Binding {
    /// The bound atom, if this is a single-atom binding.
    pub fn atom(&self) -> Option<Handle> {
        match self {
            Binding::Atom(h) => Some(*h),
            Binding::Seq(_) => None,
        }
    }

    /// True if this binding is exactly the atom `h`.
    #[inline]
    pub fn is_atom(&self, h: Handle) -> bool {
        matches!(self, Binding::Atom(g) if *g == h)
    }

    /// Atom whose incoming set leads upward from this binding.
    pub fn anchor(&self) -> Option<Handle> {
        match self {
            Binding::Atom(h) => Some(*h),
            Binding::Seq(seq) => seq.first().copied(),
        }
    }

    /// Renders the binding for logs.
    pub fn render(&self, space: &AtomSpace) -> String {
        match self {
            Binding::Atom(h) => space.render(*h),
            Binding::Seq(seq) => {
                let parts: Vec<String> = seq.iter().map(|h| space.render(*h)).collect();
                format!("[{}]", parts.join(" "))
            }
        }
    }
}

/// Working map from pattern handles (variables and terms) to bindings.
pub type Bindings = HashMap<Handle, Binding>;

/// One complete solution of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Grounding {
    /// Declared variables and globs.
    pub variables: BTreeMap<Handle, Binding>,
    /// Clause roots; `None` for optional clauses that found no match.
    pub clauses: BTreeMap<Handle, Option<Handle>>,
}

impl Grounding {
    /// The atom bound to a variable.
    pub fn get(&self, var: Handle) -> Option<Handle> {
        self.variables.get(&var).and_then(Binding::atom)
    }

    /// The run bound to a glob.
    pub fn seq(&self, glob: Handle) -> Option<&[Handle]> {
        match self.variables.get(&glob) {
            Some(Binding::Seq(seq)) => Some(seq),
            _ => None,
        }
    }
}

/// Collected solutions of one search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Groundings {
    items: Vec<Grounding>,
}

impl Groundings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, grounding: Grounding) {
        self.items.push(grounding);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Grounding> {
        self.items.iter()
    }

    /// True if some solution binds `var` to `value`.
    pub fn contains_binding(&self, var: Handle, value: Handle) -> bool {
        self.items.iter().any(|g| g.get(var) == Some(value))
    }

    /// Solutions in canonical order, for comparisons that ignore discovery
    /// order.
    pub fn sorted(&self) -> Vec<Grounding> {
        let mut items = self.items.clone();
        items.sort();
        items
    }

    /// Serialize to CBOR.
    pub fn to_cbor(&self) -> MatchResult<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserialize from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> MatchResult<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

impl IntoIterator for Groundings {
    type Item = Grounding;
    type IntoIter = std::vec::IntoIter<Grounding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Groundings {
    type Item = &'a Grounding;
    type IntoIter = std::slice::Iter<'a, Grounding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Atom and sequence accessors.
    #[test]
    fn binding_accessors() {
        let a = Handle::new(1);
        let b = Handle::new(2);
        assert_eq!(Binding::Atom(a).atom(), Some(a));
        assert!(Binding::Atom(a).is_atom(a));
        assert_eq!(Binding::Seq(vec![b, a]).anchor(), Some(b));
        assert_eq!(Binding::Seq(Vec::new()).anchor(), None);
    }

    /// Result sets compare independent of discovery order and survive CBOR.
    #[test]
    fn groundings_cbor_and_order() {
        let (x, a, b) = (Handle::new(0), Handle::new(1), Handle::new(2));
        let mut first = Grounding::default();
        first.variables.insert(x, Binding::Atom(b));
        let mut second = Grounding::default();
        second.variables.insert(x, Binding::Atom(a));

        let mut set = Groundings::new();
        set.push(first.clone());
        set.push(second.clone());
        assert!(set.contains_binding(x, a));
        assert_eq!(set.sorted(), vec![second, first]);

        let bytes = set.to_cbor().unwrap();
        assert_eq!(Groundings::from_cbor(&bytes).unwrap(), set);
    }
}
