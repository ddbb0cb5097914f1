//! Unordered links: try the permutations of one side against the other.
//!
//! Without globs the ground side is permuted. Permutations are generated in
//! lexicographic order starting from the sorted sequence, so a ground with
//! repeated children yields each distinct arrangement once and a solution is
//! never reported twice. With globs the pattern side is permuted instead
//! (keyed by atom, for the same reason) and each arrangement is handed to
//! the sequence matcher.

use super::glob::SpanMode;
use super::{PatternMatchEngine, SearchContext};
use crate::arena::Handle;
use crate::callback::MatchCallback;
use crate::term::{PatternTerm, TermArena, TermId};
use tracing::trace;

/// Saved position of an unordered digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PermState {
    /// Order of the ground children laid against the pattern children.
    Ground(Vec<Handle>),
    /// Order of the pattern children, and the glob spans that matched it.
    Pattern { order: Vec<TermId>, spans: Vec<usize> },
}

impl PermState {
    fn first(terms: &TermArena, term: &PatternTerm, ground: &[Handle], has_glob: bool) -> Self {
        if has_glob {
            let mut order = term.outgoing.clone();
            order.sort_by_key(|t| terms[*t].handle);
            PermState::Pattern {
                order,
                spans: Vec::new(),
            }
        } else {
            let mut order = ground.to_vec();
            order.sort();
            PermState::Ground(order)
        }
    }

    /// Moves to the next arrangement; false once they are used up.
    fn advance(&mut self, terms: &TermArena) -> bool {
        match self {
            PermState::Ground(order) => next_permutation_by_key(order, |h| *h),
            PermState::Pattern { order, spans } => {
                spans.clear();
                next_permutation_by_key(order, |t| terms[*t].handle)
            }
        }
    }
}

/// Rearranges `items` into the next permutation in lexicographic order of
/// `key`. Returns false, leaving `items` untouched, if it is already the
/// last one.
///
/// Equal keys are never swapped with each other, so each distinct
/// arrangement of a multiset comes up exactly once.
pub(crate) fn next_permutation_by_key<T, K: Ord>(items: &mut [T], mut key: impl FnMut(&T) -> K) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && key(&items[i - 1]) >= key(&items[i]) {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = n - 1;
    while key(&items[j]) <= key(&items[i - 1]) {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// Digit over the permutations of an unordered link.
    pub(super) fn unorder_compare(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        let osg = self.space.outgoing(hg);
        let has_glob = pattern.is_globby_term(term.handle);
        if !has_glob && term.outgoing.len() != osg.len() {
            return self.cb.fuzzy_match(term.handle, hg);
        }

        let key = (tid, hg);
        let (slot, stepping) = ctx.enter(key);

        let saved = self.state.perm_state.get(&key).cloned();
        let mut perm = match saved {
            Some(current) if !stepping => {
                let snapshot = self.state.snapshot();
                if let Some(done) = self.try_permutation(ctx, term, hg, &osg, &current, true) {
                    self.state.perm_state.insert(key, done);
                    return true;
                }
                self.state.restore(snapshot);
                return false;
            }
            Some(mut current) => {
                if current.advance(pattern.terms()) {
                    Some(current)
                } else {
                    None
                }
            }
            None => Some(PermState::first(pattern.terms(), term, &osg, has_glob)),
        };

        while let Some(current) = perm.take() {
            self.state.rewind(ctx, slot + 1);
            self.metrics.record_permutation();
            trace!(link = %tid, ground = %hg, perm = ?current, "trying permutation");
            let snapshot = self.state.snapshot();
            if let Some(done) = self.try_permutation(ctx, term, hg, &osg, &current, false) {
                self.state.perm_state.insert(key, done);
                return true;
            }
            self.state.restore(snapshot);
            let mut next = current;
            if next.advance(pattern.terms()) {
                perm = Some(next);
            }
        }

        if stepping {
            ctx.carry_from(slot);
        }
        self.state.rewind(ctx, slot);
        false
    }

    /// Compares one arrangement; returns the state to save on success.
    fn try_permutation(
        &mut self,
        ctx: &mut SearchContext,
        term: &PatternTerm,
        hg: Handle,
        osg: &[Handle],
        perm: &PermState,
        replay: bool,
    ) -> Option<PermState> {
        let (matched, done) = match perm {
            PermState::Ground(order) => {
                let matched = term
                    .outgoing
                    .iter()
                    .zip(order.iter())
                    .all(|(p, g)| self.tree_compare(ctx, *p, *g));
                (matched, perm.clone())
            }
            PermState::Pattern { order, spans } => {
                let mode = if replay {
                    SpanMode::Replay(spans.clone())
                } else {
                    SpanMode::Fresh
                };
                let mut found = Vec::new();
                let matched = self.seq_match(ctx, order, osg, 0, 0, &mut found, &mode);
                let done = PermState::Pattern {
                    order: order.clone(),
                    spans: found,
                };
                (matched, done)
            }
        };
        self.finish_link(term, hg, matched).then_some(done)
    }
}
