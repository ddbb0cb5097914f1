//! Handing finished groundings to the callback.
//!
//! With universal clauses in the pattern, a grounding is only final once
//! the whole neighborhood has been searched: any candidate that fails a
//! universal clause voids them all. Such groundings are buffered and
//! flushed by [`report_forall`](PatternMatchEngine::report_forall).
//!
//! A grounding reached along more than one path (a start atom occurring
//! twice in a clause, say) is handed over once.

use super::PatternMatchEngine;
use crate::callback::MatchCallback;
use crate::grounding::Grounding;
use tracing::{debug, trace};

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// The grounding of the declared variables and clauses so far.
    fn current_grounding(&self) -> Grounding {
        let pattern = self.pattern;
        let mut grounding = Grounding::default();
        for &var in pattern.variables().handles() {
            if let Some(binding) = self.state.var_grounding.get(&var) {
                grounding.variables.insert(var, binding.clone());
            }
        }
        for (clause, ground) in &self.state.clause_grounding {
            grounding.clauses.insert(pattern.clause(*clause).root, *ground);
        }
        grounding
    }

    /// Every clause is grounded. Returns true if the callback halts.
    pub(super) fn report_grounding(&mut self) -> bool {
        let grounding = self.current_grounding();
        if self.state.reported.contains(&grounding) || self.state.ground_cache.contains(&grounding) {
            trace!(?grounding, "grounding already found");
            return false;
        }
        self.metrics.record_grounding();
        trace!(?grounding, "grounding found");

        if self.pattern.always().is_empty() {
            self.state.reported.insert(grounding.clone());
            return self.cb.grounding(&grounding);
        }
        if self.state.forall_state {
            self.metrics.record_buffered();
            self.state.ground_cache.push(grounding);
        }
        false
    }

    /// Flushes buffered groundings if every universal clause held, and
    /// resets for the next neighborhood.
    pub(super) fn report_forall(&mut self) -> bool {
        if self.pattern.always().is_empty() {
            return false;
        }
        let cache = std::mem::take(&mut self.state.ground_cache);
        let holds = self.state.forall_state;
        self.state.forall_state = true;
        debug!(holds, buffered = cache.len(), "universal clauses decided");
        if !holds {
            return false;
        }
        for grounding in cache {
            if self.state.reported.contains(&grounding) {
                continue;
            }
            let halt = self.cb.grounding(&grounding);
            self.state.reported.insert(grounding);
            if halt {
                return true;
            }
        }
        false
    }
}
