//! Search initiation: choosing where a pattern first touches the store.
//!
//! A search starts from one clause and one proposed grounding inside it.
//! The best start is a constant: the non-variable node in a mandatory
//! structural clause with the smallest incoming set, since every solution
//! must pass through it. Patterns without such a constant fall back to
//! proposing every atom of the start clause's root type.
//!
//! A pattern whose structural clauses are joined only by evaluatable
//! clauses is searched one component at a time; the component groundings
//! are then combined and the joining clauses evaluated on each combination.

use crate::arena::Handle;
use crate::atom::AtomType;
use crate::atomspace::AtomSpace;
use crate::callback::{DefaultCallback, MatchCallback};
use crate::config::MatchConfig;
use crate::engine::{PatternMatchEngine, SearchMetrics};
use crate::error::{MatchResult, PatternError};
use crate::grounding::{Bindings, Grounding, Groundings};
use crate::pattern::{ClauseKind, Pattern, Query, VariableDecl};
use crate::rewrite::instantiate;
use crate::term::{ClauseId, PatternTerm, TermId};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Runs a full search, handing every grounding to `callback`.
pub fn find_groundings<C: MatchCallback + ?Sized>(space: &AtomSpace, pattern: &Pattern, callback: &mut C) -> SearchMetrics {
    if pattern.components().is_empty() {
        return search_connected(space, pattern, callback);
    }
    info!(components = pattern.components().len(), "starting component search");
    let mut engine = PatternMatchEngine::new(space, pattern, callback);
    if !engine.constants_hold(pattern.constant_evaluatables()) {
        return finish(engine);
    }
    let mut metrics = engine.into_metrics();
    join_components(space, pattern, callback, &mut metrics);
    log_finished(metrics)
}

/// Search of a pattern that is connected through its structural clauses.
fn search_connected<C: MatchCallback + ?Sized>(space: &AtomSpace, pattern: &Pattern, callback: &mut C) -> SearchMetrics {
    let mut engine = PatternMatchEngine::new(space, pattern, callback);
    info!(
        clauses = pattern.clauses().len(),
        variables = pattern.variables().len(),
        "starting search"
    );

    if pattern.variables().is_empty() {
        engine.explore_constant_evaluatables(pattern.constant_evaluatables());
        return finish(engine);
    }
    if !engine.constants_hold(pattern.constant_evaluatables()) {
        return finish(engine);
    }

    if let Some((clause, constant)) = choose_constant_start(space, pattern) {
        debug!(%clause, start = %space.render(constant), "constant start");
        engine.explore_neighborhood(clause, constant, constant);
        return finish(engine);
    }

    if let Some((clause, root, candidates)) = choose_variable_start(space, pattern) {
        debug!(%clause, candidates = candidates.len(), "variable start");
        for candidate in candidates {
            if engine.explore_neighborhood(clause, root, candidate) {
                break;
            }
        }
    }
    finish(engine)
}

fn finish<C: MatchCallback + ?Sized>(engine: PatternMatchEngine<'_, C>) -> SearchMetrics {
    log_finished(engine.into_metrics())
}

fn log_finished(metrics: SearchMetrics) -> SearchMetrics {
    info!(
        groundings = metrics.groundings,
        comparisons = metrics.comparisons,
        odometer_steps = metrics.odometer_steps,
        "search finished"
    );
    metrics
}

/// Compiles `query`, searches with a [`DefaultCallback`] and returns what
/// it collected.
pub fn satisfy(space: &AtomSpace, query: &Query, config: &MatchConfig) -> MatchResult<Groundings> {
    let pattern = Pattern::compile(space, query, config)?;
    let mut callback = DefaultCallback::new(space, config);
    find_groundings(space, &pattern, &mut callback);
    Ok(callback.into_groundings())
}

/// Compiles `query`, searches with a [`DefaultCallback`] and instantiates
/// the query's rewrite template once per grounding. Returns the distinct
/// atoms produced, in the order first produced.
///
/// The store is written only after the search has finished, so atoms
/// created by the rewrite never match the pattern that created them.
pub fn rewrite(space: &AtomSpace, query: &Query, config: &MatchConfig) -> MatchResult<Vec<Handle>> {
    let template = query.rewrite_template().ok_or(PatternError::NoRewrite)?;
    let groundings = satisfy(space, query, config)?;
    let mut seen = BTreeSet::new();
    let mut produced = Vec::new();
    for grounding in &groundings {
        for atom in instantiate(space, template, grounding)? {
            if seen.insert(atom) {
                produced.push(atom);
            }
        }
    }
    debug!(groundings = groundings.len(), produced = produced.len(), "rewrite finished");
    Ok(produced)
}

/// Forwards every decision to the wrapped callback but keeps the
/// groundings of a component search for the join.
struct ComponentCollector<'c, C: ?Sized> {
    inner: &'c mut C,
    found: Vec<Grounding>,
}

impl<C: MatchCallback + ?Sized> MatchCallback for ComponentCollector<'_, C> {
    fn atomspace(&self) -> &AtomSpace {
        self.inner.atomspace()
    }

    fn node_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        self.inner.node_match(pattern, ground)
    }

    fn variable_match(&mut self, decl: &VariableDecl, ground: Handle) -> bool {
        self.inner.variable_match(decl, ground)
    }

    fn scope_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        self.inner.scope_match(pattern, ground)
    }

    fn link_match(&mut self, term: &PatternTerm, ground: Handle) -> bool {
        self.inner.link_match(term, ground)
    }

    fn post_link_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        self.inner.post_link_match(pattern, ground)
    }

    fn post_link_mismatch(&mut self, pattern: Handle, ground: Handle) {
        self.inner.post_link_mismatch(pattern, ground)
    }

    fn fuzzy_match(&mut self, pattern: Handle, ground: Handle) -> bool {
        self.inner.fuzzy_match(pattern, ground)
    }

    fn get_incoming_set(&mut self, ground: Handle, link_type: Option<AtomType>) -> Vec<Handle> {
        self.inner.get_incoming_set(ground, link_type)
    }

    fn evaluate_sentence(&mut self, clause: Handle, bindings: &Bindings) -> bool {
        self.inner.evaluate_sentence(clause, bindings)
    }

    fn clause_match(&mut self, pattern: Handle, ground: Handle, bindings: &Bindings) -> bool {
        self.inner.clause_match(pattern, ground, bindings)
    }

    fn optional_clause_match(&mut self, pattern: Handle, ground: Option<Handle>, bindings: &Bindings) -> bool {
        self.inner.optional_clause_match(pattern, ground, bindings)
    }

    fn always_clause_match(&mut self, pattern: Handle, ground: Option<Handle>, bindings: &Bindings) -> bool {
        self.inner.always_clause_match(pattern, ground, bindings)
    }

    fn push(&mut self) {
        self.inner.push()
    }

    fn pop(&mut self) {
        self.inner.pop()
    }

    fn grounding(&mut self, grounding: &Grounding) -> bool {
        self.found.push(grounding.clone());
        false
    }
}

/// Searches each component, then reports every combination of component
/// groundings that the connecting clauses accept.
fn join_components<C: MatchCallback + ?Sized>(
    space: &AtomSpace,
    pattern: &Pattern,
    callback: &mut C,
    metrics: &mut SearchMetrics,
) {
    let mut parts: Vec<Vec<Grounding>> = Vec::with_capacity(pattern.components().len());
    for (i, component) in pattern.components().iter().enumerate() {
        let mut collector = ComponentCollector {
            inner: &mut *callback,
            found: Vec::new(),
        };
        metrics.absorb(&search_connected(space, component, &mut collector));
        debug!(component = i, groundings = collector.found.len(), "component searched");
        if collector.found.is_empty() {
            metrics.groundings = 0;
            return;
        }
        parts.push(collector.found);
    }
    metrics.groundings = 0;

    let mut accepted = Vec::new();
    let mut digits = vec![0usize; parts.len()];
    loop {
        let mut joined = Grounding::default();
        for (part, &i) in parts.iter().zip(&digits) {
            joined.variables.extend(part[i].variables.iter().map(|(k, v)| (*k, v.clone())));
            joined.clauses.extend(part[i].clauses.iter().map(|(k, v)| (*k, *v)));
        }
        match connectives_hold(pattern, callback, metrics, &mut joined) {
            Some(true) => accepted.push(joined),
            Some(false) => {}
            None => {
                debug!("universal clause failed across components");
                return;
            }
        }

        // Odometer over the component groundings, last digit fastest.
        let mut d = digits.len();
        loop {
            if d == 0 {
                break;
            }
            d -= 1;
            digits[d] += 1;
            if digits[d] < parts[d].len() {
                break;
            }
            digits[d] = 0;
        }
        if digits.iter().all(|i| *i == 0) {
            break;
        }
    }

    for grounding in &accepted {
        metrics.record_grounding();
        if callback.grounding(grounding) {
            return;
        }
    }
}

/// Decides the connecting clauses for one combination. `None` means a
/// universal clause failed, which voids every combination.
fn connectives_hold<C: MatchCallback + ?Sized>(
    pattern: &Pattern,
    callback: &mut C,
    metrics: &mut SearchMetrics,
    joined: &mut Grounding,
) -> Option<bool> {
    let bindings: Bindings = joined.variables.iter().map(|(k, v)| (*k, v.clone())).collect();
    let mut keep = true;
    for &(root, kind) in pattern.connectives() {
        metrics.record_evaluation();
        let truth = callback.evaluate_sentence(root, &bindings);
        match kind {
            ClauseKind::Mandatory => keep &= truth && callback.clause_match(root, root, &bindings),
            ClauseKind::Optional => {
                keep &= callback.optional_clause_match(root, truth.then_some(root), &bindings);
                if !truth {
                    joined.clauses.insert(root, None);
                }
            }
            ClauseKind::Always => {
                if !callback.always_clause_match(root, truth.then_some(root), &bindings) {
                    return None;
                }
                keep &= truth;
            }
        }
    }
    Some(keep)
}

/// Clauses a search may start from: mandatory and structural.
fn start_clauses(pattern: &Pattern) -> impl Iterator<Item = ClauseId> + '_ {
    pattern
        .clauses()
        .iter()
        .filter(|c| c.kind == ClauseKind::Mandatory && !c.evaluatable)
        .map(|c| c.id)
}

/// The rarest constant node in any start clause, with its clause.
fn choose_constant_start(space: &AtomSpace, pattern: &Pattern) -> Option<(ClauseId, Handle)> {
    let terms = pattern.terms();
    let mut best: Option<(usize, ClauseId, Handle)> = None;
    for clause in start_clauses(pattern) {
        for tid in terms.subtree(pattern.clause(clause).term) {
            let term = &terms[tid];
            if !term.is_node() || term.under_choice || term.in_evaluatable {
                continue;
            }
            if !term.quoted && (term.atom_type.is_variable() || pattern.variables().is_declared(term.handle)) {
                continue;
            }
            let size = space.incoming_set_size(term.handle);
            if best.map_or(true, |(smallest, _, _)| size < smallest) {
                best = Some((size, clause, term.handle));
            }
        }
    }
    best.map(|(_, clause, handle)| (clause, handle))
}

/// The start clause with the fewest candidates for its root, and those
/// candidates.
fn choose_variable_start(space: &AtomSpace, pattern: &Pattern) -> Option<(ClauseId, Handle, Vec<Handle>)> {
    let mut best: Option<(ClauseId, Handle, Vec<Handle>)> = None;
    for clause in start_clauses(pattern) {
        let root = pattern.clause(clause).term;
        let candidates = root_candidates(space, pattern, root);
        if best.as_ref().map_or(true, |(_, _, fewest)| candidates.len() < fewest.len()) {
            best = Some((clause, pattern.terms()[root].handle, candidates));
        }
    }
    best
}

/// Atoms that could ground the term `tid`, judged by type alone.
fn root_candidates(space: &AtomSpace, pattern: &Pattern, tid: TermId) -> Vec<Handle> {
    let term = &pattern.terms()[tid];
    if !term.quoted && term.atom_type == AtomType::Choice {
        let mut all = Vec::new();
        for alt in &term.outgoing {
            for h in root_candidates(space, pattern, *alt) {
                if !all.contains(&h) {
                    all.push(h);
                }
            }
        }
        return all;
    }
    let mut candidates = if !term.quoted && term.atom_type.is_variable() {
        space.handles()
    } else {
        space.atoms_of_type(term.atom_type)
    };
    if !term.quoted {
        candidates.retain(|h| !space.contains_variables(*h));
    }
    candidates
}
