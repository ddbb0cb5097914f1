//! Walking a clause upward from its joint, and the odometer that drives
//! the choice points met on the way.

use super::context::DigitKey;
use super::{PatternMatchEngine, SearchContext};
use crate::arena::Handle;
use crate::atom::AtomType;
use crate::callback::MatchCallback;
use crate::term::{ClauseId, TermId};
use tracing::{debug, trace};

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// Tries every position of `joint` within `clause`, grounded by `hg`.
    ///
    /// # Panics
    /// If `joint` does not occur in `clause`.
    pub(super) fn explore_term_branches(&mut self, joint: Handle, hg: Handle, clause: ClauseId) -> bool {
        let pattern = self.pattern;
        let positions = pattern.connected_terms(joint, clause);
        assert!(!positions.is_empty(), "joint {joint} does not occur in clause {clause}");
        for &tid in positions {
            if self.explore_type_branches(tid, hg) {
                return true;
            }
        }
        false
    }

    /// Like [`explore_term_branches`](Self::explore_term_branches) for a
    /// glob joint: the glob is already bound, so the walk starts at its
    /// parent, from the first atom of its run.
    pub(super) fn explore_glob_branches(&mut self, joint: Handle, seq: &[Handle], clause: ClauseId) -> bool {
        let pattern = self.pattern;
        let Some(&anchor) = seq.first() else {
            debug!(%joint, %clause, "empty glob run cannot anchor a clause");
            return false;
        };
        for &tid in pattern.connected_terms(joint, clause) {
            if self.do_term_up(tid, anchor) {
                return true;
            }
        }
        false
    }

    /// The odometer: runs passes over (`tid`, `hg`) until every combination
    /// of its digits has been visited or the callback halts.
    pub(super) fn explore_type_branches(&mut self, tid: TermId, hg: Handle) -> bool {
        let mut ctx = SearchContext::new();
        let mut seen: Vec<DigitKey> = Vec::new();

        let halt = loop {
            if self.explore_single_branch(&mut ctx, tid, hg) {
                break true;
            }
            for key in &ctx.have_more {
                if !seen.contains(key) {
                    seen.push(*key);
                }
            }

            let target = match ctx.carry.take() {
                Some(Some(digit)) => digit,
                Some(None) => break false,
                None => match ctx.have_more.last() {
                    Some(digit) => *digit,
                    None => break false,
                },
            };
            let Some(pos) = ctx.have_more.iter().position(|k| *k == target) else {
                break false;
            };
            let keep = &ctx.have_more[..=pos];
            for key in &seen {
                if !keep.contains(key) {
                    self.state.erase_digit(key);
                }
            }
            ctx.have_more.clear();
            ctx.take_step = Some(target);
            self.metrics.record_odometer_step();
            trace!(term = %tid, ground = %hg, digit = %target.0, "odometer step");
        };

        for key in &seen {
            self.state.erase_digit(key);
        }
        halt
    }

    /// One pass: compare the term against the candidate and, if it
    /// matches, continue up the clause.
    fn explore_single_branch(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let snapshot = self.state.snapshot();
        let found = self.tree_compare(ctx, tid, hg) && self.do_term_up(tid, hg);
        self.state.restore(snapshot);
        found
    }

    /// Moves from a grounded term to its parent, or accepts the clause at
    /// the root.
    pub(super) fn do_term_up(&mut self, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        let Some(parent) = term.parent else {
            return self.clause_accept(term.clause, hg);
        };

        if term.in_evaluatable {
            let root = pattern.clause(term.clause).root;
            self.metrics.record_evaluation();
            if !self.cb.evaluate_sentence(root, &self.state.var_grounding) {
                return false;
            }
            return self.clause_accept(term.clause, hg);
        }

        // Choice links are transparent: their grounding is that of the
        // alternative that matched.
        let up = &pattern.terms()[parent];
        if up.atom_type != AtomType::Choice || up.quoted {
            return self.explore_up_branches(parent, hg);
        }
        if up.is_root() {
            return self.clause_accept(term.clause, hg);
        }
        self.do_term_up(parent, hg)
    }

    /// Tries each link holding `hg` as a grounding of `parent`.
    fn explore_up_branches(&mut self, parent: TermId, hg: Handle) -> bool {
        let link_type = self.pattern.terms()[parent].atom_type;
        let incoming = self.cb.get_incoming_set(hg, Some(link_type));
        trace!(term = %parent, ground = %hg, candidates = incoming.len(), "exploring up");
        for link in incoming {
            if self.explore_type_branches(parent, link) {
                return true;
            }
        }
        false
    }
}
