//! Odometer bookkeeping for one pass over a candidate.

use crate::arena::Handle;
use crate::term::TermId;

/// A choice point: one pattern term compared against one ground atom.
pub type DigitKey = (TermId, Handle);

/// Digit registers threaded through one pass of
/// [`explore_type_branches`](super::PatternMatchEngine::explore_type_branches).
///
/// Digits register in `have_more` in the order the pass reaches them, so
/// the last entry is the innermost, most recently entered choice point.
#[derive(Debug, Default)]
pub(crate) struct SearchContext {
    /// Digit the next pass must advance; every other digit replays.
    pub take_step: Option<DigitKey>,
    /// Digits reached by the current pass that hold saved state.
    pub have_more: Vec<DigitKey>,
    /// Set when the stepped digit ran out: `Some(Some(d))` carries into
    /// `d`, `Some(None)` means the odometer is done.
    pub carry: Option<Option<DigitKey>>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a digit and reports whether this pass must advance it.
    ///
    /// Returns the digit's slot in `have_more`, used to rewind digits
    /// registered below it.
    pub fn enter(&mut self, key: DigitKey) -> (usize, bool) {
        let slot = self.have_more.len();
        self.have_more.push(key);
        let stepping = self.take_step == Some(key);
        if stepping {
            self.take_step = None;
        }
        (slot, stepping)
    }

    /// Records that the digit at `slot` ran out while being stepped: the
    /// carry goes to the digit registered just before it.
    pub fn carry_from(&mut self, slot: usize) {
        self.carry = Some(self.have_more[..slot].last().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomType;
    use crate::atomspace::AtomSpace;
    use crate::term::{ClauseId, TermArena};

    fn keys() -> (DigitKey, DigitKey) {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let l = space.add_link(AtomType::Set, [a]).unwrap();
        let mut arena = TermArena::new();
        let root = arena.build_clause(&space, l, ClauseId(0)).unwrap();
        let leaf = arena[root].outgoing[0];
        ((root, l), (leaf, a))
    }

    /// Entering the stepped digit clears the step request.
    #[test]
    fn enter_and_step() {
        let (outer, inner) = keys();
        let mut ctx = SearchContext::new();
        ctx.take_step = Some(inner);
        assert_eq!(ctx.enter(outer), (0, false));
        assert_eq!(ctx.enter(inner), (1, true));
        assert_eq!(ctx.take_step, None);
    }

    /// Carries land on the previous digit, or end the odometer at slot 0.
    #[test]
    fn carries() {
        let (outer, inner) = keys();
        let mut ctx = SearchContext::new();
        ctx.enter(outer);
        ctx.enter(inner);
        ctx.carry_from(1);
        assert_eq!(ctx.carry, Some(Some(outer)));
        ctx.carry_from(0);
        assert_eq!(ctx.carry, Some(None));
    }
}
