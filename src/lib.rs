//! Hypermatch: a hypergraph atom store and a backtracking pattern matcher.
//!
//! Knowledge lives in an [`AtomSpace`]: typed nodes and typed links over
//! other atoms, deduplicated by content. A query is a set of clauses whose
//! atoms may contain variables and globs; the matcher finds every way of
//! substituting store atoms for them such that each clause becomes an atom
//! of the store.
//!
//! The matcher handles:
//! - unordered links, matched up to permutation of their children;
//! - globs, matching runs of consecutive children within bounds;
//! - choice links, matching any one of their alternatives;
//! - evaluatable clauses, decided by evaluation instead of structure;
//! - optional (absent) and universal (always) clauses.
//!
//! A query may carry a rewrite template; [`rewrite()`] instantiates it once
//! per grounding and returns the distinct atoms it produced.
//!
//! Matching decisions and the reporting of solutions go through a
//! [`MatchCallback`], so alternative semantics plug in without touching
//! the search.
//!
//! # Example
//!
//! ```
//! use hypermatch::prelude::*;
//!
//! let space = AtomSpace::new();
//! let a = space.add_node(AtomType::Concept, "A").unwrap();
//! let b = space.add_node(AtomType::Concept, "B").unwrap();
//! space.add_link(AtomType::Edge, vec![a, b]).unwrap();
//!
//! let x = space.add_node(AtomType::Variable, "$x").unwrap();
//! let clause = space.add_link(AtomType::Edge, vec![a, x]).unwrap();
//! let query = Query::new().variable(x).clause(clause);
//!
//! let found = satisfy(&space, &query, &MatchConfig::default()).unwrap();
//! assert_eq!(found.len(), 1);
//! assert!(found.contains_binding(x, b));
//! ```

pub mod arena;
pub mod atom;
pub mod atomspace;
pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod grounding;
pub mod logging;
pub mod pattern;
pub mod rewrite;
pub mod search;
pub mod term;

pub use arena::Handle;
pub use atom::{Atom, AtomType};
pub use atomspace::AtomSpace;
pub use callback::{AttentionalFocusCallback, BuiltinEvaluator, DefaultCallback, Evaluator, MatchCallback};
pub use config::{GlobInterval, MatchConfig};
pub use engine::{PatternMatchEngine, SearchMetrics};
pub use error::{AtomSpaceError, MatchError, PatternError};
pub use grounding::{Binding, Bindings, Grounding, Groundings};
pub use pattern::{Pattern, Query};
pub use rewrite::instantiate;
pub use search::{find_groundings, rewrite, satisfy};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::arena::Handle;
    pub use crate::atom::{Atom, AtomType};
    pub use crate::atomspace::AtomSpace;
    pub use crate::callback::{
        AttentionalFocusCallback, BuiltinEvaluator, DefaultCallback, Evaluator, MatchCallback,
    };
    pub use crate::config::{GlobInterval, MatchConfig};
    pub use crate::engine::{PatternMatchEngine, SearchMetrics};
    pub use crate::error::{
        AtomSpaceError, AtomSpaceResult, MatchError, MatchResult, PatternError, PatternResult,
    };
    pub use crate::fingerprint::HashValue;
    pub use crate::grounding::{Binding, Bindings, Grounding, Groundings};
    pub use crate::pattern::{ClauseKind, Pattern, Query, VariableDecl};
    pub use crate::rewrite::instantiate;
    pub use crate::search::{find_groundings, rewrite, satisfy};
    pub use crate::term::{ClauseId, PatternTerm, TermId};
}
