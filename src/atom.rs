//! Atom types and read-only atom snapshots.
//!
//! Atoms are either nodes (a type and a name) or links (a type and an
//! ordered outgoing set of handles). The type carries the properties the
//! matcher cares about: whether children are ordered, whether the atom is
//! a variable, whether it is evaluated rather than looked up, and whether
//! it quotes its contents.

use crate::arena::Handle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Registered atom types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AtomType {
    // Nodes
    Concept,
    Predicate,
    Schema,
    Number,
    Variable,
    Glob,
    GroundedPredicate,
    Type,
    // Links
    List,
    Edge,
    Set,
    Member,
    Inheritance,
    Evaluation,
    And,
    Or,
    Not,
    Choice,
    Quote,
    Unquote,
    Identical,
    GreaterThan,
    Present,
    Absent,
    Always,
}

impl AtomType {
    /// All registered types, nodes first.
    pub const ALL: [AtomType; 25] = [
        AtomType::Concept,
        AtomType::Predicate,
        AtomType::Schema,
        AtomType::Number,
        AtomType::Variable,
        AtomType::Glob,
        AtomType::GroundedPredicate,
        AtomType::Type,
        AtomType::List,
        AtomType::Edge,
        AtomType::Set,
        AtomType::Member,
        AtomType::Inheritance,
        AtomType::Evaluation,
        AtomType::And,
        AtomType::Or,
        AtomType::Not,
        AtomType::Choice,
        AtomType::Quote,
        AtomType::Unquote,
        AtomType::Identical,
        AtomType::GreaterThan,
        AtomType::Present,
        AtomType::Absent,
        AtomType::Always,
    ];

    /// True for node types.
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            AtomType::Concept
                | AtomType::Predicate
                | AtomType::Schema
                | AtomType::Number
                | AtomType::Variable
                | AtomType::Glob
                | AtomType::GroundedPredicate
                | AtomType::Type
        )
    }

    /// True for link types.
    pub const fn is_link(self) -> bool {
        !self.is_node()
    }

    /// Links whose children carry no order.
    pub const fn is_unordered(self) -> bool {
        matches!(self, AtomType::Set | AtomType::And | AtomType::Or)
    }

    /// Variable-like nodes: ordinary variables and globs.
    pub const fn is_variable(self) -> bool {
        matches!(self, AtomType::Variable | AtomType::Glob)
    }

    /// Quote and unquote wrappers.
    pub const fn is_quotation(self) -> bool {
        matches!(self, AtomType::Quote | AtomType::Unquote)
    }

    /// Types whose truth comes from evaluation, not from presence in the
    /// store.
    ///
    /// `Evaluation` is only evaluatable when its predicate is grounded;
    /// that depends on the children, so see [`is_evaluatable_atom`].
    pub const fn is_evaluatable(self) -> bool {
        matches!(
            self,
            AtomType::Identical | AtomType::GreaterThan | AtomType::Not | AtomType::And | AtomType::Or
        )
    }

    /// Logical connectives that may sit between an evaluatable term and its
    /// clause root.
    pub const fn is_connective(self) -> bool {
        matches!(self, AtomType::Not | AtomType::And | AtomType::Or)
    }

    /// Clause wrappers that mark a clause as mandatory, optional or
    /// universal.
    pub const fn is_clause_wrapper(self) -> bool {
        matches!(self, AtomType::Present | AtomType::Absent | AtomType::Always)
    }

    /// Type inheritance. Reflexive; unordered links inherit from `Set`,
    /// connectives from `Evaluation`, and every node type from `Concept`
    /// except variables.
    pub fn is_a(self, parent: AtomType) -> bool {
        if self == parent {
            return true;
        }
        match parent {
            AtomType::Set => self.is_unordered(),
            AtomType::Evaluation => self.is_evaluatable(),
            AtomType::Concept => self.is_node() && !self.is_variable(),
            _ => false,
        }
    }

    /// Stable name used in content hashes and display.
    pub const fn name(self) -> &'static str {
        match self {
            AtomType::Concept => "ConceptNode",
            AtomType::Predicate => "PredicateNode",
            AtomType::Schema => "SchemaNode",
            AtomType::Number => "NumberNode",
            AtomType::Variable => "VariableNode",
            AtomType::Glob => "GlobNode",
            AtomType::GroundedPredicate => "GroundedPredicateNode",
            AtomType::Type => "TypeNode",
            AtomType::List => "ListLink",
            AtomType::Edge => "EdgeLink",
            AtomType::Set => "SetLink",
            AtomType::Member => "MemberLink",
            AtomType::Inheritance => "InheritanceLink",
            AtomType::Evaluation => "EvaluationLink",
            AtomType::And => "AndLink",
            AtomType::Or => "OrLink",
            AtomType::Not => "NotLink",
            AtomType::Choice => "ChoiceLink",
            AtomType::Quote => "QuoteLink",
            AtomType::Unquote => "UnquoteLink",
            AtomType::Identical => "IdenticalLink",
            AtomType::GreaterThan => "GreaterThanLink",
            AtomType::Present => "PresentLink",
            AtomType::Absent => "AbsentLink",
            AtomType::Always => "AlwaysLink",
        }
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only snapshot of one atom.
///
/// Cloning is cheap: the name and outgoing set are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub atom_type: AtomType,
    pub name: Option<Arc<str>>,
    pub outgoing: Arc<[Handle]>,
}

impl Atom {
    /// True if this atom is a node.
    pub fn is_node(&self) -> bool {
        self.atom_type.is_node()
    }

    /// True if this atom is a link.
    pub fn is_link(&self) -> bool {
        self.atom_type.is_link()
    }

    /// Number of children; zero for nodes.
    pub fn arity(&self) -> usize {
        self.outgoing.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every type is exactly one of node or link.
    #[test]
    fn node_link_partition() {
        for t in AtomType::ALL {
            assert_ne!(t.is_node(), t.is_link(), "{t}");
        }
        assert_eq!(AtomType::ALL.iter().filter(|t| t.is_node()).count(), 8);
    }

    /// Inheritance follows the unordered and evaluatable families.
    #[test]
    fn is_a_families() {
        assert!(AtomType::And.is_a(AtomType::Set));
        assert!(AtomType::Set.is_a(AtomType::Set));
        assert!(!AtomType::List.is_a(AtomType::Set));
        assert!(AtomType::GreaterThan.is_a(AtomType::Evaluation));
        assert!(AtomType::Number.is_a(AtomType::Concept));
        assert!(!AtomType::Variable.is_a(AtomType::Concept));
    }
}
