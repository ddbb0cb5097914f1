//! Top-down comparison of a pattern term against a proposed grounding.

use super::{PatternMatchEngine, SearchContext};
use crate::arena::Handle;
use crate::atom::AtomType;
use crate::callback::MatchCallback;
use crate::grounding::Binding;
use crate::pattern::VariableDecl;
use crate::term::{PatternTerm, TermId};
use tracing::trace;

/// Key a term's grounding is recorded under.
///
/// Quoted terms are literals and are not recorded under their own handle,
/// which may also occur free; their quote wrapper stands in when there is
/// one.
pub(super) fn record_key(term: &PatternTerm) -> Option<Handle> {
    if term.quoted {
        term.quote
    } else {
        Some(term.handle)
    }
}

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// Compares the term `tid` against the ground atom `hg`, binding
    /// variables on success.
    ///
    /// On failure some bindings may already have been made; callers undo
    /// them with a state snapshot.
    pub(super) fn tree_compare(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        let hp = term.handle;
        self.metrics.record_comparison();
        trace!(term = %tid, pattern = %hp, ground = %hg, "tree compare");

        if let Some(prior) = record_key(term).and_then(|k| self.state.var_grounding.get(&k)) {
            return prior.is_atom(hg);
        }

        if !term.quoted {
            if let Some(decl) = pattern.variables().decl(hp) {
                return self.variable_compare(decl, hg);
            }
            if term.atom_type == AtomType::Variable {
                return self.cb.scope_match(hp, hg);
            }
        }

        if hp == hg && !pattern.is_evaluatable(hp) {
            return self.self_compare(term);
        }

        let Some(ground_type) = self.space.atom_type(hg) else {
            return false;
        };
        if term.is_node() && ground_type.is_node() {
            return self.node_compare(hp, hg);
        }

        // Before the kind check: a choice of nodes may be grounded by a node.
        if term.atom_type == AtomType::Choice && !term.quoted {
            return self.choice_compare(ctx, tid, hg);
        }

        if !(term.atom_type.is_link() && ground_type.is_link()) {
            return self.cb.fuzzy_match(hp, hg);
        }
        if !self.cb.link_match(term, hg) {
            return false;
        }

        if term.outgoing.len() < 2 || !term.atom_type.is_unordered() {
            self.ordered_compare(ctx, tid, hg)
        } else {
            self.unorder_compare(ctx, tid, hg)
        }
    }

    fn variable_compare(&mut self, decl: &VariableDecl, hg: Handle) -> bool {
        if !self.cb.variable_match(decl, hg) {
            return false;
        }
        // Globs bind to runs, and only the sequence matcher knows the run.
        if !decl.is_glob {
            self.state.var_grounding.insert(decl.handle, Binding::Atom(hg));
            trace!(var = %decl.handle, ground = %hg, "bound variable");
        }
        true
    }

    fn self_compare(&mut self, term: &PatternTerm) -> bool {
        if !term.quoted {
            self.state.var_grounding.insert(term.handle, Binding::Atom(term.handle));
        }
        true
    }

    fn node_compare(&mut self, hp: Handle, hg: Handle) -> bool {
        let matched = self.cb.node_match(hp, hg);
        if matched && hp != hg {
            self.state.var_grounding.insert(hp, Binding::Atom(hg));
        }
        matched
    }

    /// Side-by-side comparison of an ordered link, or of an unordered link
    /// with fewer than two children.
    fn ordered_compare(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        if pattern.is_globby_term(term.handle) {
            return self.glob_compare(ctx, tid, hg);
        }

        let osg = self.space.outgoing(hg);
        let matched = if term.outgoing.len() != osg.len() {
            self.cb.fuzzy_match(term.handle, hg)
        } else {
            term.outgoing
                .iter()
                .zip(osg.iter())
                .all(|(p, g)| self.tree_compare(ctx, *p, *g))
        };
        self.finish_link(term, hg, matched)
    }

    /// Runs the post-link callbacks and records the link's grounding.
    pub(super) fn finish_link(&mut self, term: &PatternTerm, hg: Handle, matched: bool) -> bool {
        if !matched {
            self.cb.post_link_mismatch(term.handle, hg);
            return false;
        }
        if !self.cb.post_link_match(term.handle, hg) {
            return false;
        }
        self.record_grounding(term, hg);
        true
    }

    pub(super) fn record_grounding(&mut self, term: &PatternTerm, hg: Handle) {
        // Closed terms ground to themselves.
        if term.handle == hg {
            return;
        }
        if let Some(key) = record_key(term) {
            self.state.var_grounding.insert(key, Binding::Atom(hg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomspace::AtomSpace;
    use crate::callback::DefaultCallback;
    use crate::config::MatchConfig;
    use crate::pattern::{Pattern, Query};

    /// Variables bind on first sight and must agree afterwards.
    #[test]
    fn repeated_variable() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let same = space.add_link(AtomType::Edge, [a, a]).unwrap();
        let diff = space.add_link(AtomType::Edge, [a, b]).unwrap();
        let clause = space.add_link(AtomType::Edge, [x, x]).unwrap();

        let config = MatchConfig::default();
        let pattern = Pattern::compile(&space, &Query::new().variable(x).clause(clause), &config).unwrap();
        let mut cb = DefaultCallback::new(&space, &config);
        let mut engine = PatternMatchEngine::new(&space, &pattern, &mut cb);
        let root = pattern.clauses()[0].term;

        let mut ctx = SearchContext::new();
        assert!(engine.tree_compare(&mut ctx, root, same));
        assert!(engine.state.var_grounding[&x].is_atom(a));
        assert!(engine.state.var_grounding[&clause].is_atom(same));

        engine.state.clear_current();
        assert!(!engine.tree_compare(&mut ctx, root, diff));
    }

    /// Quoted variables are literals.
    #[test]
    fn quoted_variable_is_literal() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let y = space.add_node(AtomType::Variable, "$y").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let quoted = space.add_link(AtomType::Quote, [x]).unwrap();
        let clause = space.add_link(AtomType::Edge, [quoted, y]).unwrap();
        let literal = space.add_link(AtomType::Edge, [x, a]).unwrap();
        let other = space.add_link(AtomType::Edge, [a, a]).unwrap();

        let config = MatchConfig {
            skip_query_structure: false,
            ..MatchConfig::default()
        };
        let query = Query::new().variable(y).clause(clause);
        let pattern = Pattern::compile(&space, &query, &config).unwrap();
        let mut cb = DefaultCallback::new(&space, &config);
        let mut engine = PatternMatchEngine::new(&space, &pattern, &mut cb);
        let root = pattern.clauses()[0].term;

        let mut ctx = SearchContext::new();
        assert!(engine.tree_compare(&mut ctx, root, literal));
        assert!(engine.state.var_grounding[&y].is_atom(a));
        assert!(!engine.state.var_grounding.contains_key(&x));

        engine.state.clear_current();
        assert!(!engine.tree_compare(&mut ctx, root, other));
    }
}
