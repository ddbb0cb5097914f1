//! Error types.
//!
//! A pattern that fails to match is not an error; the engine reports it as
//! an empty result. The types here cover store misuse, query compilation
//! failures and configuration decoding. Engine invariant violations are
//! assertions, not variants.

use crate::arena::Handle;
use crate::atom::AtomType;
use thiserror::Error;

/// Errors raised by the atom store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtomSpaceError {
    /// Handle does not name a live atom
    #[error("unknown atom handle {0}")]
    UnknownHandle(Handle),

    /// Link built over a child that is not in the store
    #[error("link of type {link_type} references missing child {child}")]
    MissingChild { link_type: AtomType, child: Handle },

    /// Node constructor called with a link type
    #[error("{0} is a link type, not a node type")]
    NotANodeType(AtomType),

    /// Link constructor called with a node type
    #[error("{0} is a node type, not a link type")]
    NotALinkType(AtomType),

    /// Non-recursive removal of an atom that is still referenced
    #[error("atom {handle} still has {incoming} incoming link(s)")]
    HasIncoming { handle: Handle, incoming: usize },
}

/// Result type for store operations
pub type AtomSpaceResult<T> = Result<T, AtomSpaceError>;

/// Errors raised while compiling a query into a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Query has no clauses
    #[error("query has no clauses")]
    NoClauses,

    /// Declared variable is not a variable or glob node
    #[error("declared variable {0} is not a VariableNode or GlobNode")]
    NotAVariable(Handle),

    /// Declared variable occurs in no clause
    #[error("variable {0} does not occur in any clause")]
    UnusedVariable(Handle),

    /// Clauses do not form one connected component
    #[error("clauses are not connected: clause {0} shares no variable with the others")]
    Disconnected(Handle),

    /// Variable of an evaluatable clause that no structural clause can
    /// ground first
    #[error("variable {0} occurs only inside evaluatable clauses")]
    VirtualOnly(Handle),

    /// Every clause is optional, universal or evaluatable, so there is no
    /// clause to start the search from
    #[error("query has variables but no mandatory structural clause")]
    NoAnchor,

    /// Glob interval with lower bound above upper bound
    #[error("glob {glob} has empty interval {lower}..={upper}")]
    EmptyGlobInterval { glob: Handle, lower: usize, upper: usize },

    /// Rewrite search over a query without a rewrite template
    #[error("query has no rewrite template")]
    NoRewrite,

    /// Atom referenced by the query is not in the store
    #[error(transparent)]
    Store(#[from] AtomSpaceError),
}

/// Result type for query compilation
pub type PatternResult<T> = Result<T, PatternError>;

/// Errors surfaced by the top-level search entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Store(#[from] AtomSpaceError),

    /// CBOR encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for search operations
pub type MatchResult<T> = Result<T, MatchError>;

impl From<serde_cbor::Error> for MatchError {
    fn from(err: serde_cbor::Error) -> Self {
        MatchError::Serialization(err.to_string())
    }
}
