//! The callback contract between the engine and its caller.
//!
//! The engine decides *where* to look; a [`MatchCallback`] decides what
//! counts as a match there, which links to walk up through, how evaluatable
//! clauses are scored and what happens to a finished grounding. The trait's
//! default methods give plain structural matching; [`DefaultCallback`] adds
//! evaluation and result collection, and [`AttentionalFocusCallback`]
//! narrows the search to atoms with enough short-term importance.

use crate::arena::Handle;
use crate::atom::AtomType;
use crate::atomspace::AtomSpace;
use crate::config::MatchConfig;
use crate::grounding::{Binding, Bindings, Grounding, Groundings};
use crate::pattern::VariableDecl;
use crate::term::{is_black_box, PatternTerm};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Hooks the engine calls while searching.
///
/// Every method except [`atomspace`](Self::atomspace) and
/// [`grounding`](Self::grounding) has a default.
pub trait MatchCallback {
    /// Store the search runs against.
    fn atomspace(&self) -> &AtomSpace;

    /// Leaf comparison. `pattern` is never a free variable here.
    fn node_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        pattern == ground
    }

    /// Type and shape check before a variable is bound.
    fn variable_match(&mut self, decl: &VariableDecl, ground: Handle) -> bool {
        self.atomspace()
            .atom_type(ground)
            .is_some_and(|t| decl.admits_type(t))
    }

    /// Variables that are not declared by this pattern, such as the bound
    /// variables of a nested scope.
    fn scope_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        pattern == ground
    }

    /// Coarse check before the children of two links are compared.
    fn link_match(&mut self, term: &PatternTerm, ground: Handle) -> bool {
        self.atomspace().atom_type(ground) == Some(term.atom_type)
    }

    /// Veto after the children of a link matched.
    fn post_link_match(&mut self, _pattern: Handle, _ground: Handle) -> bool {
        true
    }

    /// Notification after the children of a link failed to match.
    fn post_link_mismatch(&mut self, _pattern: Handle, _ground: Handle) {}

    /// Fallback when arities or node/link kinds disagree.
    fn fuzzy_match(&mut self, _pattern: Handle, _ground: Handle) -> bool {
        false
    }

    /// Links to walk up through from a grounded atom, in the order they
    /// should be tried. `link_type` is the type of the pattern term being
    /// grounded next; `None` asks for every link.
    fn get_incoming_set(&mut self, ground: Handle, link_type: Option<AtomType>) -> Vec<Handle> {
        match link_type {
            Some(t) => self.atomspace().incoming_by_type(ground, t),
            None => self.atomspace().incoming_set(ground),
        }
    }

    /// Truth of an evaluatable clause under the current bindings.
    fn evaluate_sentence(&mut self, _clause: Handle, _bindings: &Bindings) -> bool {
        false
    }

    /// Final say on a mandatory clause grounding.
    fn clause_match(&mut self, _pattern: Handle, _ground: Handle, _bindings: &Bindings) -> bool {
        true
    }

    /// Optional clauses. Called with `Some` when the clause grounded and
    /// with `None` once its search is exhausted without one. The default
    /// reads optional clauses as absent clauses: a grounding rejects.
    fn optional_clause_match(&mut self, _pattern: Handle, ground: Option<Handle>, _bindings: &Bindings) -> bool {
        ground.is_none()
    }

    /// Universal clauses; `None` records a candidate that failed to ground.
    fn always_clause_match(&mut self, _pattern: Handle, ground: Option<Handle>, _bindings: &Bindings) -> bool {
        ground.is_some()
    }

    /// A clause was grounded and the search moves to the next one.
    fn push(&mut self) {}

    /// The search backtracked out of a clause.
    fn pop(&mut self) {}

    /// A complete solution. Returning `true` stops the search.
    fn grounding(&mut self, grounding: &Grounding) -> bool;
}

/// Scores evaluatable clauses for [`DefaultCallback`].
pub trait Evaluator {
    fn evaluate(&self, space: &AtomSpace, sentence: Handle, bindings: &Bindings) -> bool;
}

/// Implementation of a grounded predicate: receives the substituted
/// arguments.
pub type GroundedPredicateFn = Arc<dyn Fn(&AtomSpace, &[Handle]) -> bool + Send + Sync>;

/// Crisp evaluation of the built-in evaluatable types.
///
/// - `Not`, `And`, `Or`: boolean connectives.
/// - `Identical`: the two sides are the same atom after substitution.
/// - `GreaterThan`: numeric comparison of two `Number` nodes.
/// - `Evaluation` of a `GroundedPredicate`: calls the function registered
///   under the predicate's name.
/// - Anything else: true iff its substitution is present in the store.
#[derive(Clone, Default)]
pub struct BuiltinEvaluator {
    predicates: HashMap<String, GroundedPredicateFn>,
}

impl std::fmt::Debug for BuiltinEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinEvaluator")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BuiltinEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the implementation of a grounded predicate.
    pub fn with_predicate<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&AtomSpace, &[Handle]) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.to_owned(), Arc::new(predicate));
        self
    }

    fn eval(&self, space: &AtomSpace, h: Handle, bindings: &Bindings) -> bool {
        let Ok(atom) = space.get(h) else {
            return false;
        };
        let args = &atom.outgoing;
        match atom.atom_type {
            AtomType::Not => args.len() == 1 && !self.eval(space, args[0], bindings),
            AtomType::And => args.iter().all(|a| self.eval(space, *a, bindings)),
            AtomType::Or => args.iter().any(|a| self.eval(space, *a, bindings)),
            AtomType::Identical => {
                args.len() == 2 && same_after_substitution(space, args[0], args[1], bindings)
            }
            AtomType::GreaterThan => {
                if args.len() != 2 {
                    return false;
                }
                match (number(space, args[0], bindings), number(space, args[1], bindings)) {
                    (Some(a), Some(b)) => a > b,
                    _ => false,
                }
            }
            AtomType::Evaluation if is_black_box(space, h) => {
                let Some(name) = space.name(args[0]) else {
                    return false;
                };
                let Some(predicate) = self.predicates.get(name.as_ref()) else {
                    trace!(%name, "no grounded predicate registered");
                    return false;
                };
                let mut actual = Vec::new();
                for arg in args.iter().skip(1) {
                    let list = space.atom_type(*arg) == Some(AtomType::List);
                    let items: Vec<Handle> = if list {
                        space.outgoing(*arg).to_vec()
                    } else {
                        vec![*arg]
                    };
                    for item in items {
                        match substitute(space, item, bindings) {
                            Some(g) => actual.extend(g),
                            None => return false,
                        }
                    }
                }
                predicate(space, &actual)
            }
            AtomType::Present => args.iter().all(|a| present(space, *a, bindings)),
            AtomType::Absent => !args.iter().any(|a| present(space, *a, bindings)),
            _ => present(space, h, bindings),
        }
    }
}

impl Evaluator for BuiltinEvaluator {
    fn evaluate(&self, space: &AtomSpace, sentence: Handle, bindings: &Bindings) -> bool {
        self.eval(space, sentence, bindings)
    }
}

/// Grounds `h` under `bindings` without creating atoms.
///
/// Returns the run of atoms it stands for (one atom, or a glob's run), or
/// `None` if a variable is unbound or a substituted link does not exist.
fn substitute(space: &AtomSpace, h: Handle, bindings: &Bindings) -> Option<Vec<Handle>> {
    match bindings.get(&h) {
        Some(Binding::Atom(g)) => return Some(vec![*g]),
        Some(Binding::Seq(seq)) => return Some(seq.clone()),
        None => {}
    }
    let atom = space.get(h).ok()?;
    if atom.is_node() {
        return (!atom.atom_type.is_variable()).then(|| vec![h]);
    }
    if !space.contains_variables(h) {
        return Some(vec![h]);
    }
    let mut children = Vec::with_capacity(atom.arity());
    for child in atom.outgoing.iter() {
        children.extend(substitute(space, *child, bindings)?);
    }
    space.get_link(atom.atom_type, children).map(|g| vec![g])
}

fn present(space: &AtomSpace, h: Handle, bindings: &Bindings) -> bool {
    substitute(space, h, bindings).is_some_and(|g| g.len() == 1 && !space.contains_variables(g[0]))
}

fn same_after_substitution(space: &AtomSpace, a: Handle, b: Handle, bindings: &Bindings) -> bool {
    let (ga, gb) = (resolve(a, bindings), resolve(b, bindings));
    if ga == gb {
        return true;
    }
    let (Ok(x), Ok(y)) = (space.get(ga), space.get(gb)) else {
        return false;
    };
    x.is_link()
        && x.atom_type == y.atom_type
        && x.arity() == y.arity()
        && x.outgoing
            .iter()
            .zip(y.outgoing.iter())
            .all(|(p, q)| same_after_substitution(space, *p, *q, bindings))
}

fn resolve(h: Handle, bindings: &Bindings) -> Handle {
    bindings.get(&h).and_then(Binding::atom).unwrap_or(h)
}

fn number(space: &AtomSpace, h: Handle, bindings: &Bindings) -> Option<f64> {
    let g = resolve(h, bindings);
    if space.atom_type(g) != Some(AtomType::Number) {
        return None;
    }
    space.name(g)?.parse().ok()
}

/// The standard callback: structural matching that ignores the query's own
/// atoms, evaluation through an [`Evaluator`], and collection of every
/// grounding up to the configured limit.
pub struct DefaultCallback<'a> {
    space: &'a AtomSpace,
    config: MatchConfig,
    evaluator: Box<dyn Evaluator + 'a>,
    results: Groundings,
}

impl<'a> DefaultCallback<'a> {
    pub fn new(space: &'a AtomSpace, config: &MatchConfig) -> Self {
        Self {
            space,
            config: config.clone(),
            evaluator: Box::new(BuiltinEvaluator::new()),
            results: Groundings::new(),
        }
    }

    /// Replaces the evaluator used for evaluatable clauses.
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'a) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn groundings(&self) -> &Groundings {
        &self.results
    }

    pub fn into_groundings(self) -> Groundings {
        self.results
    }

    fn is_query_structure(&self, h: Handle) -> bool {
        self.config.skip_query_structure && self.space.contains_variables(h)
    }
}

impl MatchCallback for DefaultCallback<'_> {
    fn atomspace(&self) -> &AtomSpace {
        self.space
    }

    fn variable_match(&mut self, decl: &VariableDecl, ground: Handle) -> bool {
        !self.is_query_structure(ground)
            && self
                .space
                .atom_type(ground)
                .is_some_and(|t| decl.admits_type(t))
    }

    fn link_match(&mut self, term: &PatternTerm, ground: Handle) -> bool {
        if self.space.atom_type(ground) != Some(term.atom_type) {
            return false;
        }
        term.quoted || !self.is_query_structure(ground)
    }

    fn get_incoming_set(&mut self, ground: Handle, link_type: Option<AtomType>) -> Vec<Handle> {
        let mut incoming = match link_type {
            Some(t) => self.space.incoming_by_type(ground, t),
            None => self.space.incoming_set(ground),
        };
        if self.config.skip_query_structure {
            incoming.retain(|h| !self.space.contains_variables(*h));
        }
        incoming
    }

    fn evaluate_sentence(&mut self, clause: Handle, bindings: &Bindings) -> bool {
        self.evaluator.evaluate(self.space, clause, bindings)
    }

    fn grounding(&mut self, grounding: &Grounding) -> bool {
        self.results.push(grounding.clone());
        self.config
            .max_groundings
            .is_some_and(|max| self.results.len() >= max)
    }
}

/// [`DefaultCallback`] restricted to the attentional focus: atoms whose
/// short-term importance is at least the boundary.
///
/// Incoming sets are cut to the focus and walked most important first, so
/// the search never leaves the focus and tries its hottest branches first.
pub struct AttentionalFocusCallback<'a> {
    inner: DefaultCallback<'a>,
    boundary: i16,
}

impl<'a> AttentionalFocusCallback<'a> {
    pub fn new(space: &'a AtomSpace, config: &MatchConfig) -> Self {
        Self {
            inner: DefaultCallback::new(space, config),
            boundary: config.attention_boundary,
        }
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'a) -> Self {
        self.inner = self.inner.with_evaluator(evaluator);
        self
    }

    pub fn groundings(&self) -> &Groundings {
        self.inner.groundings()
    }

    pub fn into_groundings(self) -> Groundings {
        self.inner.into_groundings()
    }

    #[inline]
    fn in_focus(&self, h: Handle) -> bool {
        self.inner.space.sti(h) >= self.boundary
    }
}

impl MatchCallback for AttentionalFocusCallback<'_> {
    fn atomspace(&self) -> &AtomSpace {
        self.inner.atomspace()
    }

    fn node_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        self.inner.node_match(pattern, ground) && self.in_focus(ground)
    }

    fn variable_match(&mut self, decl: &VariableDecl, ground: Handle) -> bool {
        self.inner.variable_match(decl, ground)
    }

    fn link_match(&mut self, term: &PatternTerm, ground: Handle) -> bool {
        self.inner.link_match(term, ground) && self.in_focus(ground)
    }

    fn get_incoming_set(&mut self, ground: Handle, link_type: Option<AtomType>) -> Vec<Handle> {
        let space = self.inner.space;
        let mut incoming = self.inner.get_incoming_set(ground, link_type);
        incoming.retain(|h| space.sti(*h) >= self.boundary);
        // Stable: equal importance keeps handle order.
        incoming.sort_by_key(|h| std::cmp::Reverse(space.sti(*h)));
        incoming
    }

    fn evaluate_sentence(&mut self, clause: Handle, bindings: &Bindings) -> bool {
        self.inner.evaluate_sentence(clause, bindings)
    }

    fn grounding(&mut self, grounding: &Grounding) -> bool {
        self.inner.grounding(grounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobInterval;
    use crate::term::{ClauseId, TermArena};

    fn bind(pairs: &[(Handle, Handle)]) -> Bindings {
        pairs.iter().map(|(v, g)| (*v, Binding::Atom(*g))).collect()
    }

    /// Connectives, identity and numeric comparison.
    #[test]
    fn builtin_connectives() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let three = space.add_node(AtomType::Number, "3").unwrap();
        let five = space.add_node(AtomType::Number, "5").unwrap();
        let gt = space.add_link(AtomType::GreaterThan, [x, three]).unwrap();
        let same = space.add_link(AtomType::Identical, [x, five]).unwrap();
        let not = space.add_link(AtomType::Not, [gt]).unwrap();
        let both = space.add_link(AtomType::And, [gt, same]).unwrap();

        let eval = BuiltinEvaluator::new();
        let five_x = bind(&[(x, five)]);
        let three_x = bind(&[(x, three)]);
        assert!(eval.evaluate(&space, gt, &five_x));
        assert!(!eval.evaluate(&space, gt, &three_x));
        assert!(eval.evaluate(&space, not, &three_x));
        assert!(eval.evaluate(&space, both, &five_x));
        assert!(!eval.evaluate(&space, both, &three_x));
        // Unbound variables never evaluate true.
        assert!(!eval.evaluate(&space, gt, &Bindings::new()));
    }

    /// Structural sentences are true when their substitution exists.
    #[test]
    fn presence() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        space.add_link(AtomType::Edge, [a, b]).unwrap();
        let pattern = space.add_link(AtomType::Edge, [x, b]).unwrap();
        let absent = space.add_link(AtomType::Absent, [pattern]).unwrap();

        let eval = BuiltinEvaluator::new();
        assert!(eval.evaluate(&space, pattern, &bind(&[(x, a)])));
        assert!(!eval.evaluate(&space, pattern, &bind(&[(x, b)])));
        assert!(eval.evaluate(&space, absent, &bind(&[(x, b)])));
        let before = space.len();
        eval.evaluate(&space, pattern, &bind(&[(x, b)]));
        assert_eq!(space.len(), before);
    }

    /// Grounded predicates receive substituted arguments.
    #[test]
    fn grounded_predicates() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let big = space.add_node(AtomType::Concept, "big").unwrap();
        let small = space.add_node(AtomType::Concept, "small").unwrap();
        let gpn = space.add_node(AtomType::GroundedPredicate, "is-big").unwrap();
        let args = space.add_link(AtomType::List, [x]).unwrap();
        let sentence = space.add_link(AtomType::Evaluation, [gpn, args]).unwrap();

        let eval = BuiltinEvaluator::new().with_predicate("is-big", move |_, args| args.len() == 1 && args[0] == big);
        assert!(eval.evaluate(&space, sentence, &bind(&[(x, big)])));
        assert!(!eval.evaluate(&space, sentence, &bind(&[(x, small)])));
        assert!(!BuiltinEvaluator::new().evaluate(&space, sentence, &bind(&[(x, big)])));
    }

    /// The default callback hides query structure and stops at the limit.
    #[test]
    fn default_callback() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let data = space.add_link(AtomType::List, [a]).unwrap();
        let query = space.add_link(AtomType::List, [a, x]).unwrap();

        let config = MatchConfig {
            max_groundings: Some(2),
            ..MatchConfig::default()
        };
        let mut cb = DefaultCallback::new(&space, &config);
        assert_eq!(cb.get_incoming_set(a, None), vec![data]);
        assert_eq!(cb.get_incoming_set(a, Some(AtomType::List)), vec![data]);
        assert!(cb.get_incoming_set(a, Some(AtomType::Edge)).is_empty());
        assert!(!cb.fuzzy_match(query, data));
        assert!(cb.optional_clause_match(query, None, &Bindings::new()));
        assert!(!cb.optional_clause_match(query, Some(data), &Bindings::new()));

        let mut arena = TermArena::new();
        let t = arena.build_clause(&space, query, ClauseId(0)).unwrap();
        assert!(cb.link_match(&arena[t], data));
        assert!(!cb.link_match(&arena[t], query));

        let decl = VariableDecl {
            handle: x,
            is_glob: false,
            allowed_types: None,
            interval: GlobInterval::default(),
        };
        assert!(cb.variable_match(&decl, a));
        assert!(!cb.variable_match(&decl, query));

        assert!(!cb.grounding(&Grounding::default()));
        assert!(cb.grounding(&Grounding::default()));
        assert_eq!(cb.into_groundings().len(), 2);
    }

    /// Attentional focus filters and orders by importance.
    #[test]
    fn attentional_focus() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let c = space.add_node(AtomType::Concept, "C").unwrap();
        let ab = space.add_link(AtomType::Edge, [a, b]).unwrap();
        let ac = space.add_link(AtomType::Edge, [a, c]).unwrap();
        let la = space.add_link(AtomType::List, [a]).unwrap();
        space.set_sti(ab, 5).unwrap();
        space.set_sti(ac, 20).unwrap();
        space.set_sti(la, -1).unwrap();
        space.set_sti(b, 10).unwrap();

        let config = MatchConfig {
            attention_boundary: 0,
            ..MatchConfig::default()
        };
        let mut cb = AttentionalFocusCallback::new(&space, &config);
        assert_eq!(cb.get_incoming_set(a, None), vec![ac, ab]);
        assert!(cb.get_incoming_set(a, Some(AtomType::List)).is_empty());
        assert!(cb.node_match(b, b));
        space.set_sti(b, -3).unwrap();
        assert!(!cb.node_match(b, b));
    }
}
