//! The pattern-match engine: a backtracking search over one compiled
//! pattern.
//!
//! The search grows a solution one clause at a time. A clause is entered at
//! a *joint*, an atom whose grounding is already known, and is walked
//! upward from there: each link in the grounding's incoming set is a
//! candidate for the joint's parent term, compared top-down against the
//! pattern with [`tree_compare`](PatternMatchEngine::tree_compare). When
//! the clause root is reached, the clause is accepted and the next clause
//! is chosen by [`get_next_untried_clause`](PatternMatchEngine::get_next_untried_clause).
//!
//! # Choice points
//!
//! Three kinds of term can match one ground in more than one way: unordered
//! links (permutations), choice links (alternatives) and ordered links
//! holding globs (span assignments). Each such (term, ground) pair is a
//! *digit* of an odometer. A pass over a candidate link registers the
//! digits it reaches in [`SearchContext::have_more`]; when the pass fails
//! or its solutions are used up, the odometer advances its last digit, and
//! a digit that runs out carries into the digit before it. Every
//! combination of choices is visited once.
//!
//! # Invariants
//!
//! - Bindings made by a failed comparison are rolled back before the next
//!   alternative is tried.
//! - Digit state lives only while its odometer runs; every odometer erases
//!   the states it created before returning.
//! - Clause stacks push and pop in pairs; an unbalanced pop is a bug and
//!   panics.
//!
//! # Determinism
//!
//! Incoming sets are walked in the order the callback returns them,
//! permutations in lexicographic order and glob spans longest first, so two
//! runs over the same store report the same groundings in the same order.

mod choice;
mod compare;
mod context;
mod driver;
mod explore;
mod glob;
mod report;
mod state;
mod unordered;

pub use context::DigitKey;
pub(crate) use context::SearchContext;
pub(crate) use state::SearchState;

use crate::atomspace::AtomSpace;
use crate::callback::MatchCallback;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};

/// Counters collected during one search.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetrics {
    /// Number of term/ground comparisons.
    pub comparisons: u64,
    /// Number of unordered-link permutations tried.
    pub permutations: u64,
    /// Number of choice-link alternatives tried.
    pub choice_alternatives: u64,
    /// Number of glob span assignments tried.
    pub glob_spans: u64,
    /// Number of times an odometer advanced a digit.
    pub odometer_steps: u64,
    /// Number of clauses accepted.
    pub clauses_accepted: u64,
    /// Number of evaluatable sentences evaluated.
    pub evaluations: u64,
    /// Number of complete groundings found.
    pub groundings: u64,
    /// Number of groundings held back until universal clauses were decided.
    pub groundings_buffered: u64,
}

impl SearchMetrics {
    /// Records a term comparison.
    pub fn record_comparison(&mut self) {
        self.comparisons += 1;
    }

    /// Records a permutation attempt.
    pub fn record_permutation(&mut self) {
        self.permutations += 1;
    }

    /// Records a choice alternative attempt.
    pub fn record_choice_alternative(&mut self) {
        self.choice_alternatives += 1;
    }

    /// Records a glob span attempt.
    pub fn record_glob_span(&mut self) {
        self.glob_spans += 1;
    }

    /// Records an odometer step.
    pub fn record_odometer_step(&mut self) {
        self.odometer_steps += 1;
    }

    /// Records an accepted clause.
    pub fn record_clause_accepted(&mut self) {
        self.clauses_accepted += 1;
    }

    /// Records a sentence evaluation.
    pub fn record_evaluation(&mut self) {
        self.evaluations += 1;
    }

    /// Records a complete grounding.
    pub fn record_grounding(&mut self) {
        self.groundings += 1;
    }

    /// Records a grounding buffered behind universal clauses.
    pub fn record_buffered(&mut self) {
        self.groundings_buffered += 1;
    }

    /// Adds the counters of another search to these.
    pub fn absorb(&mut self, other: &SearchMetrics) {
        self.comparisons += other.comparisons;
        self.permutations += other.permutations;
        self.choice_alternatives += other.choice_alternatives;
        self.glob_spans += other.glob_spans;
        self.odometer_steps += other.odometer_steps;
        self.clauses_accepted += other.clauses_accepted;
        self.evaluations += other.evaluations;
        self.groundings += other.groundings;
        self.groundings_buffered += other.groundings_buffered;
    }

    /// Resets all metrics to zero.
    pub fn reset(&mut self) {
        *self = SearchMetrics::default();
    }
}

/// Search state for one pattern against one store.
///
/// Built per search by [`crate::search::find_groundings`]; the entry points
/// used by the initiator are [`explore_neighborhood`](Self::explore_neighborhood)
/// and [`explore_constant_evaluatables`](Self::explore_constant_evaluatables).
pub struct PatternMatchEngine<'a, C: MatchCallback + ?Sized> {
    space: &'a AtomSpace,
    pattern: &'a Pattern,
    cb: &'a mut C,
    state: SearchState,
    metrics: SearchMetrics,
}

impl<'a, C: MatchCallback + ?Sized> PatternMatchEngine<'a, C> {
    /// Engine for one search of `pattern` over `space`, reporting to `cb`.
    pub fn new(space: &'a AtomSpace, pattern: &'a Pattern, cb: &'a mut C) -> Self {
        Self {
            space,
            pattern,
            cb,
            state: SearchState::default(),
            metrics: SearchMetrics::default(),
        }
    }

    /// The compiled pattern being searched.
    pub fn pattern(&self) -> &Pattern {
        self.pattern
    }

    /// Counters collected so far.
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Ends the search, keeping only its counters.
    pub fn into_metrics(self) -> SearchMetrics {
        self.metrics
    }
}
