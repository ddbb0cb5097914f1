//! Clause-level control: accepting a clause, choosing the next one and
//! starting a search from a neighborhood.
//!
//! Clauses are taken in tiers. Mandatory structural clauses come first,
//! then evaluatable ones, then black boxes, then the same three tiers for
//! optional clauses; universal clauses come last. Within a tier the next
//! clause is the *thinnest* one reachable through the joint with the
//! smallest incoming set, which keeps the branching factor low.

use super::PatternMatchEngine;
use crate::arena::Handle;
use crate::callback::MatchCallback;
use crate::grounding::Binding;
use crate::pattern::ClauseKind;
use crate::term::ClauseId;
use tracing::debug;

/// Clause handed out by clause selection, with the grounded atom it joins
/// the partial solution through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct NextClause {
    pub joint: Handle,
    pub clause: ClauseId,
}

/// Clause tiers as (evaluatable, black box, optional) flags, in search
/// order.
const TIERS: [(bool, bool, bool); 6] = [
    (false, false, false),
    (true, false, false),
    (true, true, false),
    (false, false, true),
    (true, false, true),
    (true, true, true),
];

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// The walk reached the root of `clause`, grounded by `hg`.
    pub(super) fn clause_accept(&mut self, clause: ClauseId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let c = pattern.clause(clause);
        let matched = match c.kind {
            ClauseKind::Optional => {
                self.state.clause_accepted = true;
                self.cb.optional_clause_match(c.root, Some(hg), &self.state.var_grounding)
            }
            ClauseKind::Always => {
                self.state.did_check_forall = true;
                let holds = self.cb.always_clause_match(c.root, Some(hg), &self.state.var_grounding);
                self.state.forall_state &= holds;
                holds
            }
            ClauseKind::Mandatory => self.cb.clause_match(c.root, hg, &self.state.var_grounding),
        };
        if !matched {
            return false;
        }

        self.metrics.record_clause_accepted();
        if !c.evaluatable {
            self.state.clause_grounding.insert(clause, Some(hg));
        }
        debug!(%clause, ground = %self.space.render(hg), depth = self.state.depth(), "clause accepted");
        self.do_next_clause()
    }

    /// Picks the next clause and explores it, or reports the grounding when
    /// every clause is done.
    pub(super) fn do_next_clause(&mut self) -> bool {
        let pattern = self.pattern;
        self.clause_stacks_push();

        let Some(mut next) = self.get_next_untried_clause() else {
            let found = self.all_mandatory_issued() && self.report_grounding();
            self.clause_stacks_pop();
            return found;
        };

        self.state.clause_accepted = false;
        let mut found = self.explore_joint(next);

        // An optional clause that never reached its root is given up on,
        // if the callback agrees, and the search moves on without it.
        while !found && !self.state.clause_accepted && pattern.clause(next.clause).kind == ClauseKind::Optional {
            let root = pattern.clause(next.clause).root;
            if !self.cb.optional_clause_match(root, None, &self.state.var_grounding) {
                self.clause_stacks_pop();
                return false;
            }
            self.state.clause_grounding.insert(next.clause, None);

            match self.get_next_untried_clause() {
                None => {
                    found = self.all_mandatory_issued() && self.report_grounding();
                    break;
                }
                Some(following) => {
                    next = following;
                    self.state.clause_accepted = false;
                    found = self.explore_joint(next);
                }
            }
        }

        self.clause_stacks_pop();
        found
    }

    /// False if some mandatory clause could not be reached, as when it
    /// only connects through an optional clause that was given up on.
    fn all_mandatory_issued(&self) -> bool {
        let missing = self
            .pattern
            .mandatory()
            .iter()
            .find(|c| !self.state.issued.contains(*c));
        if let Some(clause) = missing {
            debug!(%clause, "mandatory clause left ungrounded");
            return false;
        }
        true
    }

    /// Explores a selected clause through its joint's current grounding.
    ///
    /// # Panics
    /// If the joint has no grounding yet.
    fn explore_joint(&mut self, next: NextClause) -> bool {
        let grounding = self.state.var_grounding.get(&next.joint).cloned();
        let Some(grounding) = grounding else {
            panic!("joint {} of clause {} has not been grounded", next.joint, next.clause);
        };
        self.explore_clause(next.joint, grounding, next.clause)
    }

    /// Next clause to ground, in tier order, marked as issued.
    pub(super) fn get_next_untried_clause(&mut self) -> Option<NextClause> {
        let pattern = self.pattern;
        for (search_virtual, search_black, search_optionals) in TIERS {
            if search_virtual && !pattern.has_evaluatables() {
                continue;
            }
            if search_black && !pattern.has_black() {
                continue;
            }
            if search_optionals && pattern.optionals().is_empty() {
                continue;
            }
            if let Some(next) = self.get_next_thinnest_clause(search_virtual, search_black, search_optionals) {
                return Some(next);
            }
        }

        for &clause in pattern.always() {
            if self.state.issued.contains(&clause) {
                continue;
            }
            let joint = pattern
                .clause(clause)
                .variables
                .iter()
                .copied()
                .find(|v| self.state.var_grounding.contains_key(v));
            if let Some(joint) = joint {
                self.state.issued.insert(clause);
                return Some(NextClause { joint, clause });
            }
        }
        None
    }

    /// Among unissued clauses of one tier that touch a grounded joint,
    /// the one with the fewest ungrounded variables, preferring joints
    /// with small incoming sets.
    fn get_next_thinnest_clause(
        &mut self,
        search_virtual: bool,
        search_black: bool,
        search_optionals: bool,
    ) -> Option<NextClause> {
        let pattern = self.pattern;
        let mut ungrounded = Vec::new();
        let mut thick_vars: Vec<(usize, Handle)> = Vec::new();
        for &var in pattern.variables().handles() {
            if !self.state.var_grounding.contains_key(&var) {
                ungrounded.push(var);
                continue;
            }
            let joint = if pattern.variables().is_glob(var) {
                self.get_glob_embedding(var)
            } else {
                var
            };
            let size = self
                .state
                .var_grounding
                .get(&joint)
                .and_then(Binding::anchor)
                .map_or(0, |g| self.space.incoming_set_size(g));
            thick_vars.push((size, joint));
        }
        // Stable: ties keep declaration order.
        thick_vars.sort_by_key(|(size, _)| *size);

        let mut best: Option<(usize, usize, NextClause)> = None;
        for (size, joint) in thick_vars {
            if best.is_some_and(|(best_size, _, _)| size > best_size) {
                break;
            }
            for &clause in pattern.joint_clauses(joint) {
                if self.state.issued.contains(&clause) {
                    continue;
                }
                let c = pattern.clause(clause);
                // Evaluation needs every variable of the sentence bound.
                if c.evaluatable && !c.variables.iter().all(|v| self.state.var_grounding.contains_key(v)) {
                    continue;
                }
                if c.kind == ClauseKind::Always
                    || (!search_virtual && c.evaluatable)
                    || (!search_black && c.black)
                    || (!search_optionals && c.kind == ClauseKind::Optional)
                {
                    continue;
                }
                let thickness = if ungrounded.len() < 2 {
                    1
                } else {
                    c.variables.iter().filter(|v| ungrounded.contains(*v)).count()
                };
                if best.map_or(true, |(_, thinnest, _)| thickness < thinnest) {
                    best = Some((size, thickness, NextClause { joint, clause }));
                }
            }
        }

        let (_, _, next) = best?;
        self.state.issued.insert(next.clause);
        Some(next)
    }

    /// Joint to enter a new clause through when `glob` is grounded: the
    /// glob's parent link when that link is grounded and shared, since a
    /// glob's run may be empty and cannot lead upward.
    fn get_glob_embedding(&self, glob: Handle) -> Handle {
        let pattern = self.pattern;
        let Some(&clause) = pattern
            .joint_clauses(glob)
            .iter()
            .find(|c| !self.state.issued.contains(*c))
        else {
            return glob;
        };
        for &tid in pattern.connected_terms(glob, clause) {
            let Some(parent) = pattern.terms()[tid].parent else {
                return glob;
            };
            let embed = pattern.terms()[parent].handle;
            if self.state.var_grounding.contains_key(&embed) && pattern.joint_clauses(embed).len() > 1 {
                return embed;
            }
        }
        glob
    }

    pub(super) fn clause_stacks_push(&mut self) {
        self.state.push();
        self.cb.push();
    }

    pub(super) fn clause_stacks_pop(&mut self) {
        self.cb.pop();
        self.state.pop();
    }

    fn clause_stacks_clear(&mut self) {
        self.state.clear_stacks();
    }

    /// Searches every grounding reachable from `term` grounded by `grnd`
    /// in `clause`. Returns true if the callback halted the search.
    pub fn explore_neighborhood(&mut self, clause: ClauseId, term: Handle, grnd: Handle) -> bool {
        self.clause_stacks_clear();
        let halt = self.explore_redex(term, grnd, clause);
        let stop = self.report_forall();
        halt || stop
    }

    fn explore_redex(&mut self, term: Handle, grnd: Handle, clause: ClauseId) -> bool {
        self.state.clear_current();
        self.state.issued.insert(clause);
        self.explore_clause(term, Binding::Atom(grnd), clause)
    }

    /// Explores one clause through a joint and its grounding.
    fn explore_clause(&mut self, joint: Handle, grounding: Binding, clause: ClauseId) -> bool {
        let pattern = self.pattern;
        let c = pattern.clause(clause);

        if !c.evaluatable {
            self.state.did_check_forall = false;
            let found = match &grounding {
                Binding::Atom(hg) => self.explore_term_branches(joint, *hg, clause),
                Binding::Seq(seq) => self.explore_glob_branches(joint, seq, clause),
            };
            if !self.state.did_check_forall && c.kind == ClauseKind::Always {
                let holds = self.cb.always_clause_match(c.root, None, &self.state.var_grounding);
                self.state.forall_state &= holds;
            }
            return found;
        }

        self.metrics.record_evaluation();
        let found = self.cb.evaluate_sentence(c.root, &self.state.var_grounding);
        debug!(%clause, found, "evaluated clause");
        if found {
            let hg = grounding.anchor().unwrap_or(joint);
            return self.clause_accept(clause, hg);
        }
        if c.kind == ClauseKind::Always {
            let holds = self.cb.always_clause_match(c.root, None, &self.state.var_grounding);
            self.state.forall_state &= holds;
        }
        false
    }

    /// A pattern without variables: it holds when every sentence
    /// evaluates true, and then reports the empty grounding.
    pub fn explore_constant_evaluatables(&mut self, clauses: &[Handle]) -> bool {
        self.clause_stacks_clear();
        self.state.clear_current();
        let found = self.constants_hold(clauses);
        if found {
            self.report_grounding();
        }
        found
    }

    /// True if every variable-free sentence evaluates true.
    pub fn constants_hold(&mut self, clauses: &[Handle]) -> bool {
        for &sentence in clauses {
            self.metrics.record_evaluation();
            if !self.cb.evaluate_sentence(sentence, &self.state.var_grounding) {
                debug!(sentence = %self.space.render(sentence), "constant clause is false");
                return false;
            }
        }
        true
    }
}
