//! Choice links: the link is grounded when any one alternative is.

use super::{PatternMatchEngine, SearchContext};
use crate::arena::Handle;
use crate::callback::MatchCallback;
use crate::term::{PatternTerm, TermId};
use tracing::trace;

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// Digit over the alternatives of a choice term, tried in order.
    pub(super) fn choice_compare(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        let key = (tid, hg);
        let (slot, stepping) = ctx.enter(key);

        let start = match self.state.choice_state.get(&key).copied() {
            Some(current) if !stepping => {
                let snapshot = self.state.snapshot();
                if self.try_alternative(ctx, term, term.outgoing[current], hg) {
                    return true;
                }
                self.state.restore(snapshot);
                return false;
            }
            Some(current) => current + 1,
            None => 0,
        };

        for (index, alt) in term.outgoing.iter().enumerate().skip(start) {
            self.state.rewind(ctx, slot + 1);
            self.metrics.record_choice_alternative();
            trace!(choice = %tid, index, ground = %hg, "trying alternative");
            let snapshot = self.state.snapshot();
            if self.try_alternative(ctx, term, *alt, hg) {
                self.state.choice_state.insert(key, index);
                return true;
            }
            self.state.restore(snapshot);
        }

        if stepping {
            ctx.carry_from(slot);
        }
        self.state.rewind(ctx, slot);
        false
    }

    fn try_alternative(&mut self, ctx: &mut SearchContext, term: &PatternTerm, alt: TermId, hg: Handle) -> bool {
        let matched = self.tree_compare(ctx, alt, hg);
        self.finish_link(term, hg, matched)
    }
}
