//! Globs: pattern elements that absorb a run of consecutive ground atoms.
//!
//! An ordered link holding globs can match one ground link in several
//! ways, one per assignment of spans to its globs. Assignments are
//! enumerated depth first, each glob trying its longest admissible span
//! first, so the sequence of spans taken (one entry per glob, left to
//! right) names an assignment and orders them.
//!
//! # Invariants
//!
//! - A glob's span stays within its interval and covers only atoms its
//!   declaration admits.
//! - A glob that is already bound must match the same run again.
//! - `Resume` yields only assignments strictly after the one it was given.

use super::{PatternMatchEngine, SearchContext};
use crate::arena::Handle;
use crate::callback::MatchCallback;
use crate::grounding::Binding;
use crate::term::TermId;
use tracing::trace;

/// Where the sequence matcher starts its enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SpanMode {
    /// From the first assignment.
    Fresh,
    /// Only the given assignment.
    Replay(Vec<usize>),
    /// From the assignment after the given one.
    Resume(Vec<usize>),
}

impl SpanMode {
    fn is_replay(&self) -> bool {
        matches!(self, SpanMode::Replay(_))
    }

    /// Spans to try for glob number `k`, longest first, given the spans
    /// already taken by the globs before it.
    fn candidates(&self, k: usize, taken: &[usize], lower: usize, max: usize) -> Vec<usize> {
        let span = |hi: usize| -> Vec<usize> {
            if lower > hi {
                Vec::new()
            } else {
                (lower..=hi).rev().collect()
            }
        };
        match self {
            SpanMode::Fresh => span(max),
            SpanMode::Replay(forced) => match forced.get(k) {
                Some(&n) if lower <= n && n <= max => vec![n],
                _ => Vec::new(),
            },
            SpanMode::Resume(forced) => match forced.get(k) {
                Some(&n) if forced[..k] == *taken => span(n.min(max)),
                _ => span(max),
            },
        }
    }
}

impl<C: MatchCallback + ?Sized> PatternMatchEngine<'_, C> {
    /// Digit over the span assignments of an ordered link with globs.
    pub(super) fn glob_compare(&mut self, ctx: &mut SearchContext, tid: TermId, hg: Handle) -> bool {
        let pattern = self.pattern;
        let term = &pattern.terms()[tid];
        let osg = self.space.outgoing(hg);
        let key = (tid, hg);
        let (slot, stepping) = ctx.enter(key);

        let mut mode = match self.state.glob_state.get(&key).cloned() {
            Some(spans) if !stepping => SpanMode::Replay(spans),
            Some(spans) => SpanMode::Resume(spans),
            None => SpanMode::Fresh,
        };
        loop {
            let replay = mode.is_replay();
            if !replay {
                self.state.rewind(ctx, slot + 1);
            }
            let snapshot = self.state.snapshot();
            let mut spans = Vec::new();
            let found = self.seq_match(ctx, &term.outgoing, &osg, 0, 0, &mut spans, &mode);
            if found && self.finish_link(term, hg, true) {
                trace!(link = %tid, ground = %hg, ?spans, "glob assignment");
                self.state.glob_state.insert(key, spans);
                return true;
            }
            self.state.restore(snapshot);
            if replay {
                return false;
            }
            if !found {
                break;
            }
            mode = SpanMode::Resume(spans);
        }

        self.cb.post_link_mismatch(term.handle, hg);
        if stepping {
            ctx.carry_from(slot);
        }
        self.state.rewind(ctx, slot);
        false
    }

    /// Matches `pat[ip..]` against exactly `gnd[jg..]`, recording the span
    /// of each glob in `spans`. Returns the first assignment `mode` allows.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn seq_match(
        &mut self,
        ctx: &mut SearchContext,
        pat: &[TermId],
        gnd: &[Handle],
        ip: usize,
        jg: usize,
        spans: &mut Vec<usize>,
        mode: &SpanMode,
    ) -> bool {
        let pattern = self.pattern;
        if ip == pat.len() {
            if jg != gnd.len() {
                return false;
            }
            return !matches!(mode, SpanMode::Resume(forced) if *forced == *spans);
        }

        let term = &pattern.terms()[pat[ip]];
        let glob = if term.quoted {
            None
        } else {
            pattern.variables().decl(term.handle).filter(|d| d.is_glob)
        };
        let Some(decl) = glob else {
            if jg == gnd.len() {
                return false;
            }
            let mark = ctx.have_more.len();
            let snapshot = self.state.snapshot();
            if self.tree_compare(ctx, pat[ip], gnd[jg]) && self.seq_match(ctx, pat, gnd, ip + 1, jg + 1, spans, mode) {
                return true;
            }
            self.state.restore(snapshot);
            if !mode.is_replay() {
                self.state.rewind(ctx, mark);
            }
            return false;
        };

        let bound = self.state.var_grounding.get(&decl.handle).map(|b| match b {
            Binding::Seq(seq) if gnd[jg..].starts_with(seq) => Some(seq.len()),
            _ => None,
        });
        match bound {
            Some(Some(len)) => {
                spans.push(len);
                if self.seq_match(ctx, pat, gnd, ip + 1, jg + len, spans, mode) {
                    return true;
                }
                spans.pop();
                return false;
            }
            Some(None) => return false,
            None => {}
        }

        let mut max = 0;
        while jg + max < gnd.len()
            && decl.interval.admits_upper(max + 1)
            && self.cb.variable_match(decl, gnd[jg + max])
        {
            max += 1;
        }

        for span in mode.candidates(spans.len(), spans, decl.interval.lower, max) {
            self.metrics.record_glob_span();
            let mark = ctx.have_more.len();
            let snapshot = self.state.snapshot();
            self.state
                .var_grounding
                .insert(decl.handle, Binding::Seq(gnd[jg..jg + span].to_vec()));
            spans.push(span);
            if self.seq_match(ctx, pat, gnd, ip + 1, jg + span, spans, mode) {
                return true;
            }
            spans.pop();
            self.state.restore(snapshot);
            if !mode.is_replay() {
                self.state.rewind(ctx, mark);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh enumeration tries longest spans first.
    #[test]
    fn fresh_candidates() {
        assert_eq!(SpanMode::Fresh.candidates(0, &[], 1, 3), vec![3, 2, 1]);
        assert!(SpanMode::Fresh.candidates(0, &[], 2, 1).is_empty());
    }

    /// Replay pins the recorded span.
    #[test]
    fn replay_candidates() {
        let mode = SpanMode::Replay(vec![2, 0]);
        assert_eq!(mode.candidates(0, &[], 0, 3), vec![2]);
        assert_eq!(mode.candidates(1, &[2], 0, 3), vec![0]);
        assert!(mode.candidates(0, &[], 0, 1).is_empty());
    }

    /// Resume starts at the recorded span while on its prefix, and from the
    /// top once it has left it.
    #[test]
    fn resume_candidates() {
        let mode = SpanMode::Resume(vec![2, 1]);
        assert_eq!(mode.candidates(0, &[], 0, 3), vec![2, 1, 0]);
        assert_eq!(mode.candidates(1, &[2], 0, 3), vec![1, 0]);
        assert_eq!(mode.candidates(1, &[1], 0, 3), vec![3, 2, 1, 0]);
    }
}
