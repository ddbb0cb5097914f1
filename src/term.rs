//! Pattern terms: one node per *position* in a clause.
//!
//! The same atom can occur at several places in a clause, and every
//! occurrence needs its own permutation, choice and glob state, so clauses
//! are unfolded into a tree of `PatternTerm`s held in a flat arena. Parents
//! are plain indices: the tree is acyclic and built once per query, and
//! the search only ever reads it.
//!
//! Quote and unquote wrappers do not get terms of their own. The wrapped
//! term takes the wrapper's position, carries the quotation flag, and
//! remembers the wrapper handle so its grounding can be recorded under it.

use crate::arena::Handle;
use crate::atom::AtomType;
use crate::atomspace::AtomSpace;
use crate::error::AtomSpaceResult;
use std::fmt;
use std::ops::Index;

/// Index of a term in a `TermArena`.
///
/// Ordering is creation order, which is pre-order within a clause; the
/// permutation explorer relies on it being a total order.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Index of a clause in a compiled pattern.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClauseId(pub(crate) u32);

impl ClauseId {
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One occurrence of an atom inside a clause.
#[derive(Debug, Clone)]
pub struct PatternTerm {
    pub handle: Handle,
    pub atom_type: AtomType,
    /// `None` at the clause root.
    pub parent: Option<TermId>,
    pub outgoing: Vec<TermId>,
    /// Inside a quotation: variables here are literals.
    pub quoted: bool,
    /// The elided quote/unquote wrapper directly above this term.
    pub quote: Option<Handle>,
    pub clause: ClauseId,
    /// Some unquoted ancestor in the clause is evaluatable.
    pub in_evaluatable: bool,
    /// Some ancestor in the clause is a choice link.
    pub under_choice: bool,
}

impl PatternTerm {
    /// True at the top of its clause.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True for leaf terms.
    #[inline]
    pub fn is_node(&self) -> bool {
        self.atom_type.is_node()
    }
}

/// True if the atom's truth comes from evaluation.
///
/// That is every evaluatable type, plus evaluation links whose predicate is
/// a grounded (externally implemented) predicate.
pub fn is_evaluatable_atom(space: &AtomSpace, handle: Handle) -> bool {
    match space.atom_type(handle) {
        Some(AtomType::Evaluation) => is_black_box(space, handle),
        Some(t) => t.is_evaluatable(),
        None => false,
    }
}

/// True for evaluation links over a grounded predicate, whose evaluation
/// runs opaque user code.
pub fn is_black_box(space: &AtomSpace, handle: Handle) -> bool {
    space.atom_type(handle) == Some(AtomType::Evaluation)
        && space
            .outgoing(handle)
            .first()
            .is_some_and(|p| space.atom_type(*p) == Some(AtomType::GroundedPredicate))
}

/// Flat storage for the terms of every clause of one pattern.
#[derive(Debug, Clone, Default)]
pub struct TermArena {
    terms: Vec<PatternTerm>,
}

struct BuildFrame {
    parent: Option<TermId>,
    quoted: bool,
    quote: Option<Handle>,
    in_evaluatable: bool,
    under_choice: bool,
}

impl TermArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, id: TermId) -> Option<&PatternTerm> {
        self.terms.get(id.index())
    }

    /// All terms in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (TermId, &PatternTerm)> {
        self.terms
            .iter()
            .enumerate()
            .map(|(i, t)| (TermId(i as u32), t))
    }

    /// Unfolds the clause rooted at `root` and returns its root term.
    pub fn build_clause(&mut self, space: &AtomSpace, root: Handle, clause: ClauseId) -> AtomSpaceResult<TermId> {
        let frame = BuildFrame {
            parent: None,
            quoted: false,
            quote: None,
            in_evaluatable: false,
            under_choice: false,
        };
        self.build(space, root, clause, frame)
    }

    fn build(&mut self, space: &AtomSpace, handle: Handle, clause: ClauseId, frame: BuildFrame) -> AtomSpaceResult<TermId> {
        let atom = space.get(handle)?;
        if atom.arity() == 1 {
            let elide = match atom.atom_type {
                AtomType::Quote => Some(true),
                AtomType::Unquote => Some(false),
                _ => None,
            };
            // Only the outermost quote escapes; quotes inside a quotation are
            // literal links, and so are unquotes outside of one.
            if let Some(quoting) = elide.filter(|q| *q != frame.quoted) {
                let inner = BuildFrame {
                    quoted: quoting,
                    quote: Some(handle),
                    ..frame
                };
                return self.build(space, atom.outgoing[0], clause, inner);
            }
        }

        let id = TermId(self.terms.len() as u32);
        self.terms.push(PatternTerm {
            handle,
            atom_type: atom.atom_type,
            parent: frame.parent,
            outgoing: Vec::with_capacity(atom.arity()),
            quoted: frame.quoted,
            quote: frame.quote,
            clause,
            in_evaluatable: frame.in_evaluatable,
            under_choice: frame.under_choice,
        });

        let evaluatable = !frame.quoted && is_evaluatable_atom(space, handle);
        for child in atom.outgoing.iter() {
            let child_frame = BuildFrame {
                parent: Some(id),
                quoted: frame.quoted,
                quote: None,
                in_evaluatable: frame.in_evaluatable || evaluatable,
                under_choice: frame.under_choice || atom.atom_type == AtomType::Choice,
            };
            let child_id = self.build(space, *child, clause, child_frame)?;
            self.terms[id.index()].outgoing.push(child_id);
        }
        Ok(id)
    }

    /// The term and every term below it, pre-order.
    pub fn subtree(&self, root: TermId) -> Vec<TermId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self[id].outgoing.iter().rev().copied());
        }
        out
    }

    /// Strict ancestors of a term, nearest first.
    pub fn ancestors(&self, id: TermId) -> impl Iterator<Item = TermId> + '_ {
        std::iter::successors(self[id].parent, move |p| self[*p].parent)
    }
}

impl Index<TermId> for TermArena {
    type Output = PatternTerm;

    fn index(&self, id: TermId) -> &PatternTerm {
        &self.terms[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parents, children and clause membership of a simple clause.
    #[test]
    fn tree_shape() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let inner = space.add_link(AtomType::List, [x, a]).unwrap();
        let root = space.add_link(AtomType::Edge, [inner, x]).unwrap();

        let mut arena = TermArena::new();
        let r = arena.build_clause(&space, root, ClauseId(0)).unwrap();
        assert_eq!(arena.len(), 5);
        assert!(arena[r].is_root());
        let kids = arena[r].outgoing.clone();
        assert_eq!(arena[kids[0]].handle, inner);
        assert_eq!(arena[kids[1]].handle, x);
        assert_eq!(arena[kids[1]].parent, Some(r));
        // $x occurs twice, as two distinct terms.
        let xs: Vec<_> = arena.iter().filter(|(_, t)| t.handle == x).map(|(id, _)| id).collect();
        assert_eq!(xs.len(), 2);
        assert_eq!(arena.ancestors(xs[0]).collect::<Vec<_>>(), vec![kids[0], r]);
        assert_eq!(arena.subtree(r).len(), 5);
    }

    /// Quote wrappers are elided and mark their contents as literal.
    #[test]
    fn quotation() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let y = space.add_node(AtomType::Variable, "$y").unwrap();
        let unq = space.add_link(AtomType::Unquote, [y]).unwrap();
        let body = space.add_link(AtomType::List, [x, unq]).unwrap();
        let quote = space.add_link(AtomType::Quote, [body]).unwrap();
        let root = space.add_link(AtomType::Edge, [quote]).unwrap();

        let mut arena = TermArena::new();
        let r = arena.build_clause(&space, root, ClauseId(3)).unwrap();
        let list = arena[r].outgoing[0];
        assert_eq!(arena[list].handle, body);
        assert!(arena[list].quoted);
        assert_eq!(arena[list].quote, Some(quote));
        let (qx, qy) = (arena[list].outgoing[0], arena[list].outgoing[1]);
        assert!(arena[qx].quoted);
        assert!(!arena[qy].quoted);
        assert_eq!(arena[qy].quote, Some(unq));
        assert_eq!(arena[qy].clause, ClauseId(3));
    }

    /// Evaluatable ancestry and choice ancestry are propagated down.
    #[test]
    fn ancestry_flags() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let n = space.add_node(AtomType::Number, "3").unwrap();
        let gt = space.add_link(AtomType::GreaterThan, [x, n]).unwrap();
        let mut arena = TermArena::new();
        let r = arena.build_clause(&space, gt, ClauseId(0)).unwrap();
        assert!(!arena[r].in_evaluatable);
        assert!(arena[arena[r].outgoing[0]].in_evaluatable);

        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let choice = space.add_link(AtomType::Choice, [a, x]).unwrap();
        let c = arena.build_clause(&space, choice, ClauseId(1)).unwrap();
        assert!(!arena[c].under_choice);
        assert!(arena[arena[c].outgoing[1]].under_choice);
    }

    /// Grounded-predicate evaluations are black boxes.
    #[test]
    fn black_boxes() {
        let space = AtomSpace::new();
        let gpn = space.add_node(AtomType::GroundedPredicate, "is-big").unwrap();
        let pn = space.add_node(AtomType::Predicate, "likes").unwrap();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let args = space.add_link(AtomType::List, [x]).unwrap();
        let black = space.add_link(AtomType::Evaluation, [gpn, args]).unwrap();
        let plain = space.add_link(AtomType::Evaluation, [pn, args]).unwrap();
        assert!(is_black_box(&space, black));
        assert!(is_evaluatable_atom(&space, black));
        assert!(!is_evaluatable_atom(&space, plain));
    }
}
