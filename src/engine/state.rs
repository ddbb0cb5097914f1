//! Mutable search state and the clause stacks that save it.

use super::context::{DigitKey, SearchContext};
use super::unordered::PermState;
use crate::arena::Handle;
use crate::grounding::{Bindings, Grounding};
use crate::term::ClauseId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Grounding of each clause decided so far; `None` for optional clauses
/// that were given up on.
pub(crate) type ClauseGroundings = BTreeMap<ClauseId, Option<Handle>>;

/// Everything a clause push saves.
#[derive(Debug, Clone)]
struct Frame {
    var_grounding: Bindings,
    clause_grounding: ClauseGroundings,
    issued: BTreeSet<ClauseId>,
    choice_state: HashMap<DigitKey, usize>,
    perm_state: HashMap<DigitKey, PermState>,
    glob_state: HashMap<DigitKey, Vec<usize>>,
}

/// Bindings and digit states of the search in progress.
#[derive(Debug)]
pub(crate) struct SearchState {
    /// Variables and pattern terms to their groundings.
    pub var_grounding: Bindings,
    pub clause_grounding: ClauseGroundings,
    /// Clauses already handed out by clause selection.
    pub issued: BTreeSet<ClauseId>,
    /// Index of the alternative that matched, per choice digit.
    pub choice_state: HashMap<DigitKey, usize>,
    /// Permutation that matched, per unordered digit.
    pub perm_state: HashMap<DigitKey, PermState>,
    /// Span of each glob, per globby digit.
    pub glob_state: HashMap<DigitKey, Vec<usize>>,
    /// The optional clause being explored reached its root.
    pub clause_accepted: bool,
    /// The universal clause being explored reached its root.
    pub did_check_forall: bool,
    /// Every universal clause has held so far in this neighborhood.
    pub forall_state: bool,
    /// Groundings waiting on `forall_state`.
    pub ground_cache: Vec<Grounding>,
    /// Groundings already handed to the callback; kept across neighborhoods.
    pub reported: BTreeSet<Grounding>,
    stack: Vec<Frame>,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            var_grounding: Bindings::new(),
            clause_grounding: ClauseGroundings::new(),
            issued: BTreeSet::new(),
            choice_state: HashMap::new(),
            perm_state: HashMap::new(),
            glob_state: HashMap::new(),
            clause_accepted: false,
            did_check_forall: false,
            forall_state: true,
            ground_cache: Vec::new(),
            reported: BTreeSet::new(),
            stack: Vec::new(),
        }
    }
}

impl SearchState {
    /// Saves bindings, clause bookkeeping and digit states.
    pub fn push(&mut self) {
        self.stack.push(Frame {
            var_grounding: self.var_grounding.clone(),
            clause_grounding: self.clause_grounding.clone(),
            issued: self.issued.clone(),
            choice_state: self.choice_state.clone(),
            perm_state: self.perm_state.clone(),
            glob_state: self.glob_state.clone(),
        });
    }

    /// Restores the state saved by the matching [`push`](Self::push).
    ///
    /// # Panics
    /// If there is no matching push.
    pub fn pop(&mut self) {
        let Some(frame) = self.stack.pop() else {
            panic!("clause stack popped more often than pushed");
        };
        self.var_grounding = frame.var_grounding;
        self.clause_grounding = frame.clause_grounding;
        self.issued = frame.issued;
        self.choice_state = frame.choice_state;
        self.perm_state = frame.perm_state;
        self.glob_state = frame.glob_state;
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Drops every saved frame.
    pub fn clear_stacks(&mut self) {
        self.stack.clear();
    }

    /// Forgets all bindings and digit states, ready for a new start.
    pub fn clear_current(&mut self) {
        self.var_grounding.clear();
        self.clause_grounding.clear();
        self.issued.clear();
        self.choice_state.clear();
        self.perm_state.clear();
        self.glob_state.clear();
    }

    /// Snapshot taken before a tentative comparison.
    pub fn snapshot(&self) -> (Bindings, ClauseGroundings) {
        (self.var_grounding.clone(), self.clause_grounding.clone())
    }

    /// Undoes a failed comparison.
    pub fn restore(&mut self, snapshot: (Bindings, ClauseGroundings)) {
        self.var_grounding = snapshot.0;
        self.clause_grounding = snapshot.1;
    }

    /// Forgets the saved value of one digit, whatever its kind.
    pub fn erase_digit(&mut self, key: &DigitKey) {
        self.choice_state.remove(key);
        self.perm_state.remove(key);
        self.glob_state.remove(key);
    }

    /// Erases and unregisters the digits registered at or after `mark`.
    pub fn rewind(&mut self, ctx: &mut SearchContext, mark: usize) {
        for key in ctx.have_more.drain(mark..) {
            self.erase_digit(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomType;
    use crate::atomspace::AtomSpace;
    use crate::grounding::Binding;
    use crate::term::TermArena;

    /// Pops restore exactly what the matching push saved.
    #[test]
    fn push_pop() {
        let mut state = SearchState::default();
        let (x, a, b) = (Handle::new(0), Handle::new(1), Handle::new(2));
        state.var_grounding.insert(x, Binding::Atom(a));
        state.push();
        state.var_grounding.insert(x, Binding::Atom(b));
        state.issued.insert(ClauseId(1));
        assert_eq!(state.depth(), 1);
        state.pop();
        assert!(state.var_grounding[&x].is_atom(a));
        assert!(state.issued.is_empty());
        assert_eq!(state.depth(), 0);
    }

    /// An unmatched pop is a bug.
    #[test]
    #[should_panic(expected = "clause stack")]
    fn unbalanced_pop() {
        SearchState::default().pop();
    }

    /// Rewinding drops the digits registered after the mark.
    #[test]
    fn rewind_erases_nested_digits() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let l = space.add_link(AtomType::Choice, [a, b]).unwrap();
        let mut arena = TermArena::new();
        let root = arena.build_clause(&space, l, ClauseId(0)).unwrap();
        let (outer, inner) = ((root, l), (arena[root].outgoing[0], a));

        let mut state = SearchState::default();
        let mut ctx = SearchContext::new();
        ctx.enter(outer);
        ctx.enter(inner);
        state.choice_state.insert(outer, 0);
        state.choice_state.insert(inner, 1);
        state.rewind(&mut ctx, 1);
        assert_eq!(ctx.have_more, vec![outer]);
        assert_eq!(state.choice_state.get(&outer), Some(&0));
        assert!(!state.choice_state.contains_key(&inner));
    }
}
