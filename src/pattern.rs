//! Query compilation.
//!
//! A [`Query`] is what a caller writes: declared variables plus a list of
//! clause atoms, all living in the same [`AtomSpace`] as the data they are
//! matched against. [`Pattern::compile`] unwraps the clause wrappers,
//! unfolds every clause into pattern terms and computes the descriptor sets
//! the engine consults while it searches.
//!
//! # Invariants
//! - Every declared variable occurs unquoted in at least one clause.
//! - The clauses that hold variables form one connected component.
//!   Structural clauses joined only through evaluatable clauses are split
//!   into components that are searched apart and joined afterwards.
//! - Unless the pattern has no variables at all, some mandatory structural
//!   clause holds a variable, so the search has somewhere to start.
//! - Every variable of an evaluatable clause also occurs in a structural
//!   clause that is grounded before it.

use crate::arena::Handle;
use crate::atom::AtomType;
use crate::atomspace::AtomSpace;
use crate::config::{GlobInterval, MatchConfig};
use crate::error::{AtomSpaceResult, PatternError, PatternResult};
use crate::term::{is_black_box, is_evaluatable_atom, ClauseId, TermArena, TermId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// One declared variable or glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub handle: Handle,
    pub is_glob: bool,
    /// `None` admits every type.
    pub allowed_types: Option<BTreeSet<AtomType>>,
    /// Span bounds; only meaningful for globs.
    pub interval: GlobInterval,
}

impl VariableDecl {
    /// True if an atom of this type may ground the variable.
    pub fn admits_type(&self, atom_type: AtomType) -> bool {
        self.allowed_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| atom_type.is_a(*t)))
    }
}

/// The declared variables of a pattern, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    order: Vec<Handle>,
    decls: HashMap<Handle, VariableDecl>,
}

impl Variables {
    fn insert(&mut self, decl: VariableDecl) {
        if !self.decls.contains_key(&decl.handle) {
            self.order.push(decl.handle);
        }
        self.decls.insert(decl.handle, decl);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[inline]
    pub fn is_declared(&self, handle: Handle) -> bool {
        self.decls.contains_key(&handle)
    }

    pub fn decl(&self, handle: Handle) -> Option<&VariableDecl> {
        self.decls.get(&handle)
    }

    #[inline]
    pub fn is_glob(&self, handle: Handle) -> bool {
        self.decls.get(&handle).is_some_and(|d| d.is_glob)
    }

    /// Span bounds of a declared glob.
    pub fn interval(&self, handle: Handle) -> Option<GlobInterval> {
        self.decls.get(&handle).filter(|d| d.is_glob).map(|d| d.interval)
    }

    /// Handles in declaration order.
    pub fn handles(&self) -> &[Handle] {
        &self.order
    }

    /// Declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDecl> {
        self.order.iter().filter_map(|h| self.decls.get(h))
    }

    /// The declarations of `keep` only, in the same order.
    fn restricted(&self, keep: &HashSet<Handle>) -> Variables {
        let mut out = Variables::default();
        for decl in self.iter().filter(|d| keep.contains(&d.handle)) {
            out.insert(decl.clone());
        }
        out
    }
}

#[derive(Debug, Clone)]
struct VarSpec {
    handle: Handle,
    allowed_types: Option<BTreeSet<AtomType>>,
    interval: Option<GlobInterval>,
}

/// A query as written by the caller.
///
/// With no declared variables, every unquoted variable and glob node in
/// the clauses is declared implicitly, in order of first occurrence.
#[derive(Debug, Clone, Default)]
pub struct Query {
    variables: Vec<VarSpec>,
    clauses: Vec<Handle>,
    rewrite: Option<Handle>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an untyped variable. Glob nodes declared this way get the
    /// configured default interval.
    pub fn variable(mut self, var: Handle) -> Self {
        self.variables.push(VarSpec {
            handle: var,
            allowed_types: None,
            interval: None,
        });
        self
    }

    /// Declares a variable that only atoms of the given types may ground.
    pub fn typed_variable(mut self, var: Handle, types: impl IntoIterator<Item = AtomType>) -> Self {
        self.variables.push(VarSpec {
            handle: var,
            allowed_types: Some(types.into_iter().collect()),
            interval: None,
        });
        self
    }

    /// Declares a glob with explicit span bounds.
    pub fn glob(mut self, glob: Handle, interval: GlobInterval) -> Self {
        self.variables.push(VarSpec {
            handle: glob,
            allowed_types: None,
            interval: Some(interval),
        });
        self
    }

    /// Adds a clause. `Present`, `Absent` and `Always` wrappers mark it
    /// mandatory, optional or universal; a bare atom is mandatory.
    pub fn clause(mut self, clause: Handle) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Query whose clauses are the children of an `And` body, or the body
    /// itself otherwise.
    pub fn from_body(space: &AtomSpace, body: Handle) -> AtomSpaceResult<Self> {
        let atom = space.get(body)?;
        let clauses = if atom.atom_type == AtomType::And {
            atom.outgoing.to_vec()
        } else {
            vec![body]
        };
        Ok(Self {
            variables: Vec::new(),
            clauses,
            rewrite: None,
        })
    }

    /// Sets the template a rewrite search instantiates for every grounding.
    /// Variables and globs in it are replaced by their groundings; quoted
    /// parts are copied with the quote removed.
    pub fn rewrite(mut self, template: Handle) -> Self {
        self.rewrite = Some(template);
        self
    }

    pub fn clauses(&self) -> &[Handle] {
        &self.clauses
    }

    pub fn rewrite_template(&self) -> Option<Handle> {
        self.rewrite
    }
}

/// How a clause takes part in a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    /// Must be grounded.
    Mandatory,
    /// Grounded if possible; the callback decides what a (non-)match means.
    Optional,
    /// Must hold for every grounding found.
    Always,
}

/// One compiled clause.
#[derive(Debug, Clone)]
pub struct Clause {
    pub id: ClauseId,
    /// Clause atom with its wrapper removed.
    pub root: Handle,
    pub term: TermId,
    pub kind: ClauseKind,
    /// Holds an evaluatable term, so it is evaluated, not looked up.
    pub evaluatable: bool,
    /// Holds a grounded-predicate evaluation.
    pub black: bool,
    /// Declared variables in the clause, in declaration order.
    pub variables: Vec<Handle>,
}

/// A compiled query.
#[derive(Debug, Clone)]
pub struct Pattern {
    variables: Variables,
    terms: TermArena,
    clauses: Vec<Clause>,
    mandatory: Vec<ClauseId>,
    optionals: Vec<ClauseId>,
    always: Vec<ClauseId>,
    black: BTreeSet<ClauseId>,
    /// Unquoted evaluatable atoms.
    evaluatable_terms: HashSet<Handle>,
    /// Evaluatable atoms and every atom above one.
    evaluatable_holders: HashSet<Handle>,
    /// Links with a glob as a direct child.
    globby_terms: HashSet<Handle>,
    /// Variables and variable-holding terms shared by two or more clauses.
    connectivity_map: BTreeMap<Handle, Vec<ClauseId>>,
    /// Every position of an atom within a clause.
    connected_terms: HashMap<(Handle, ClauseId), Vec<TermId>>,
    /// Variable-free evaluatable clauses.
    constant_evaluatables: Vec<Handle>,
    /// Structurally disconnected parts; empty when the pattern is connected
    /// without its evaluatable clauses.
    components: Vec<Pattern>,
    /// Evaluatable clauses spanning two or more components.
    connectives: Vec<(Handle, ClauseKind)>,
    /// Instantiated once per grounding by a rewrite search.
    rewrite: Option<Handle>,
}

#[derive(Debug, Clone)]
struct ProbedClause {
    root: Handle,
    kind: ClauseKind,
    variables: Vec<Handle>,
    evaluatable: bool,
}

impl Pattern {
    /// Compiles a query against the store its atoms live in.
    pub fn compile(space: &AtomSpace, query: &Query, config: &MatchConfig) -> PatternResult<Self> {
        if query.clauses.is_empty() {
            return Err(PatternError::NoClauses);
        }

        let mut roots = Vec::with_capacity(query.clauses.len());
        for &clause in &query.clauses {
            let atom = space.get(clause)?;
            let kind = match atom.atom_type {
                AtomType::Present => Some(ClauseKind::Mandatory),
                AtomType::Absent => Some(ClauseKind::Optional),
                AtomType::Always => Some(ClauseKind::Always),
                _ => None,
            };
            match kind {
                Some(kind) => roots.extend(atom.outgoing.iter().map(|h| (*h, kind))),
                None => roots.push((clause, ClauseKind::Mandatory)),
            }
        }

        // Probe pass: variable occurrences and evaluatability per clause.
        let mut probe = TermArena::new();
        let mut occurrences = Vec::with_capacity(roots.len());
        let mut evaluatable = Vec::with_capacity(roots.len());
        for (i, &(root, _)) in roots.iter().enumerate() {
            let top = probe.build_clause(space, root, ClauseId(i as u32))?;
            let mut found = Vec::new();
            let mut holds_evaluatable = false;
            for id in probe.subtree(top) {
                let term = &probe[id];
                if term.quoted {
                    continue;
                }
                if term.atom_type.is_variable() && !found.contains(&term.handle) {
                    found.push(term.handle);
                }
                holds_evaluatable |= is_evaluatable_atom(space, term.handle);
            }
            occurrences.push(found);
            evaluatable.push(holds_evaluatable);
        }

        let variables = declare_variables(space, query, config, &occurrences)?;

        let mut probed = Vec::new();
        let mut constant_evaluatables = Vec::new();
        for (i, &(root, kind)) in roots.iter().enumerate() {
            let vars: Vec<Handle> = variables
                .handles()
                .iter()
                .copied()
                .filter(|v| occurrences[i].contains(v))
                .collect();
            if vars.is_empty() {
                if evaluatable[i] {
                    constant_evaluatables.push(root);
                } else {
                    debug!(clause = %space.render(root), "dropping constant clause");
                }
                continue;
            }
            probed.push(ProbedClause {
                root,
                kind,
                variables: vars,
                evaluatable: evaluatable[i],
            });
        }

        check_grounding_order(&variables, &probed)?;
        check_connectivity(&probed)?;

        let (groups, spanning) = structural_components(&probed);
        let mut components = Vec::new();
        if groups.len() > 1 {
            for group in &groups {
                let part: Vec<ProbedClause> = group.iter().map(|&i| probed[i].clone()).collect();
                let held: HashSet<Handle> = part.iter().flat_map(|c| c.variables.iter().copied()).collect();
                let part_vars = variables.restricted(&held);
                check_grounding_order(&part_vars, &part)?;
                components.push(Pattern::assemble(space, part_vars, part, Vec::new())?);
            }
        }
        let connectives = if components.is_empty() {
            Vec::new()
        } else {
            spanning.iter().map(|&i| (probed[i].root, probed[i].kind)).collect()
        };

        let mut pattern = Pattern::assemble(space, variables, probed, constant_evaluatables)?;
        pattern.components = components;
        pattern.connectives = connectives;
        pattern.rewrite = query.rewrite;

        debug!(
            clauses = pattern.clauses.len(),
            variables = pattern.variables.len(),
            terms = pattern.terms.len(),
            components = pattern.components.len(),
            "compiled pattern"
        );
        Ok(pattern)
    }

    fn assemble(
        space: &AtomSpace,
        variables: Variables,
        probed: Vec<ProbedClause>,
        constant_evaluatables: Vec<Handle>,
    ) -> PatternResult<Self> {
        let mut pattern = Pattern {
            variables,
            terms: TermArena::new(),
            clauses: Vec::with_capacity(probed.len()),
            mandatory: Vec::new(),
            optionals: Vec::new(),
            always: Vec::new(),
            black: BTreeSet::new(),
            evaluatable_terms: HashSet::new(),
            evaluatable_holders: HashSet::new(),
            globby_terms: HashSet::new(),
            connectivity_map: BTreeMap::new(),
            connected_terms: HashMap::new(),
            constant_evaluatables,
            components: Vec::new(),
            connectives: Vec::new(),
            rewrite: None,
        };
        for (i, clause) in probed.into_iter().enumerate() {
            pattern.add_clause(space, ClauseId(i as u32), clause)?;
        }
        pattern.build_connectivity();
        Ok(pattern)
    }

    fn add_clause(&mut self, space: &AtomSpace, id: ClauseId, probed: ProbedClause) -> PatternResult<()> {
        let term = self.terms.build_clause(space, probed.root, id)?;
        let mut black = false;
        for tid in self.terms.subtree(term) {
            let t = &self.terms[tid];
            self.connected_terms.entry((t.handle, id)).or_default().push(tid);
            if t.quoted {
                continue;
            }
            if is_evaluatable_atom(space, t.handle) {
                black |= is_black_box(space, t.handle);
                self.evaluatable_terms.insert(t.handle);
                self.evaluatable_holders.insert(t.handle);
                for up in self.terms.ancestors(tid) {
                    self.evaluatable_holders.insert(self.terms[up].handle);
                }
            }
            if self.variables.is_glob(t.handle) {
                if let Some(parent) = t.parent {
                    self.globby_terms.insert(self.terms[parent].handle);
                }
            }
        }

        match probed.kind {
            ClauseKind::Mandatory => self.mandatory.push(id),
            ClauseKind::Optional => self.optionals.push(id),
            ClauseKind::Always => self.always.push(id),
        }
        if black {
            self.black.insert(id);
        }
        self.clauses.push(Clause {
            id,
            root: probed.root,
            term,
            kind: probed.kind,
            evaluatable: probed.evaluatable,
            black,
            variables: probed.variables,
        });
        Ok(())
    }

    fn build_connectivity(&mut self) {
        // Terms are created parents first, so a reverse sweep sees every
        // child before its parent.
        let mut holds_var = vec![false; self.terms.len()];
        let ids: Vec<TermId> = self.terms.iter().map(|(id, _)| id).collect();
        for id in ids.iter().rev() {
            let t = &self.terms[*id];
            let own = !t.quoted && self.variables.is_declared(t.handle);
            let below = t
                .outgoing
                .iter()
                .any(|c| holds_var[c.as_u32() as usize]);
            holds_var[id.as_u32() as usize] = own || below;
        }

        let mut shared: BTreeMap<Handle, BTreeSet<ClauseId>> = BTreeMap::new();
        for id in ids {
            let t = &self.terms[id];
            if !t.quoted && holds_var[id.as_u32() as usize] {
                shared.entry(t.handle).or_default().insert(t.clause);
            }
        }
        self.connectivity_map = shared
            .into_iter()
            .filter(|(_, clauses)| clauses.len() > 1)
            .map(|(h, clauses)| (h, clauses.into_iter().collect()))
            .collect();
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn terms(&self) -> &TermArena {
        &self.terms
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn clause(&self, id: ClauseId) -> &Clause {
        &self.clauses[id.index()]
    }

    pub fn mandatory(&self) -> &[ClauseId] {
        &self.mandatory
    }

    pub fn optionals(&self) -> &[ClauseId] {
        &self.optionals
    }

    pub fn always(&self) -> &[ClauseId] {
        &self.always
    }

    pub fn has_black(&self) -> bool {
        !self.black.is_empty()
    }

    pub fn has_evaluatables(&self) -> bool {
        !self.evaluatable_holders.is_empty()
    }

    /// True for evaluatable atoms and the atoms holding them.
    #[inline]
    pub fn is_evaluatable(&self, handle: Handle) -> bool {
        self.evaluatable_holders.contains(&handle)
    }

    /// True for the evaluatable atoms themselves.
    pub fn is_evaluatable_term(&self, handle: Handle) -> bool {
        self.evaluatable_terms.contains(&handle)
    }

    #[inline]
    pub fn is_globby_term(&self, handle: Handle) -> bool {
        self.globby_terms.contains(&handle)
    }

    /// Clauses sharing a joint; empty if it occurs in only one clause.
    pub fn joint_clauses(&self, joint: Handle) -> &[ClauseId] {
        self.connectivity_map
            .get(&joint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Positions of an atom within one clause.
    pub fn connected_terms(&self, handle: Handle, clause: ClauseId) -> &[TermId] {
        self.connected_terms
            .get(&(handle, clause))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn constant_evaluatables(&self) -> &[Handle] {
        &self.constant_evaluatables
    }

    /// Sub-patterns to search separately, when the structural clauses fall
    /// apart without the evaluatable ones. Empty otherwise.
    pub fn components(&self) -> &[Pattern] {
        &self.components
    }

    /// Evaluatable clauses that join the components, decided on each
    /// combination of component groundings.
    pub fn connectives(&self) -> &[(Handle, ClauseKind)] {
        &self.connectives
    }

    /// Template instantiated per grounding by [`crate::search::rewrite`].
    pub fn rewrite(&self) -> Option<Handle> {
        self.rewrite
    }
}

fn declare_variables(
    space: &AtomSpace,
    query: &Query,
    config: &MatchConfig,
    occurrences: &[Vec<Handle>],
) -> PatternResult<Variables> {
    let specs: Vec<VarSpec> = if query.variables.is_empty() {
        let mut implicit: Vec<Handle> = Vec::new();
        for h in occurrences.iter().flatten() {
            if !implicit.contains(h) {
                implicit.push(*h);
            }
        }
        implicit
            .into_iter()
            .map(|handle| VarSpec {
                handle,
                allowed_types: None,
                interval: None,
            })
            .collect()
    } else {
        query.variables.clone()
    };

    let mut variables = Variables::default();
    for spec in specs {
        let is_glob = match space.atom_type(spec.handle) {
            Some(AtomType::Glob) => true,
            Some(AtomType::Variable) => false,
            _ => return Err(PatternError::NotAVariable(spec.handle)),
        };
        let interval = spec.interval.unwrap_or(config.default_glob_interval);
        if let Some(upper) = interval.upper.filter(|u| *u < interval.lower) {
            return Err(PatternError::EmptyGlobInterval {
                glob: spec.handle,
                lower: interval.lower,
                upper,
            });
        }
        if !occurrences.iter().any(|vars| vars.contains(&spec.handle)) {
            return Err(PatternError::UnusedVariable(spec.handle));
        }
        variables.insert(VariableDecl {
            handle: spec.handle,
            is_glob,
            allowed_types: spec.allowed_types,
            interval,
        });
    }
    Ok(variables)
}

fn check_grounding_order(variables: &Variables, clauses: &[ProbedClause]) -> PatternResult<()> {
    if variables.is_empty() {
        return Ok(());
    }
    let anchored = clauses
        .iter()
        .any(|c| c.kind == ClauseKind::Mandatory && !c.evaluatable);
    if !anchored {
        return Err(PatternError::NoAnchor);
    }
    for clause in clauses.iter().filter(|c| c.evaluatable) {
        for var in &clause.variables {
            let grounded_first = clauses.iter().any(|other| {
                !other.evaluatable
                    && other.variables.contains(var)
                    && (clause.kind != ClauseKind::Mandatory || other.kind == ClauseKind::Mandatory)
            });
            if !grounded_first {
                return Err(PatternError::VirtualOnly(*var));
            }
        }
    }
    Ok(())
}

/// Union-find over clause indices.
struct Partition {
    parent: Vec<usize>,
}

impl Partition {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, i: usize, j: usize) {
        let (a, b) = (self.find(i), self.find(j));
        self.parent[a] = b;
    }

    /// Joins the selected clauses that share a variable. Returns, per
    /// variable, one selected clause holding it.
    fn join_shared(&mut self, clauses: &[ProbedClause], select: impl Fn(&ProbedClause) -> bool) -> HashMap<Handle, usize> {
        let mut owner: HashMap<Handle, usize> = HashMap::new();
        for (i, clause) in clauses.iter().enumerate().filter(|(_, c)| select(*c)) {
            for var in &clause.variables {
                match owner.get(var) {
                    Some(&j) => self.union(i, j),
                    None => {
                        owner.insert(*var, i);
                    }
                }
            }
        }
        owner
    }
}

fn check_connectivity(clauses: &[ProbedClause]) -> PatternResult<()> {
    if clauses.is_empty() {
        return Ok(());
    }
    let mut partition = Partition::new(clauses.len());
    partition.join_shared(clauses, |_| true);
    let first = partition.find(0);
    for i in 1..clauses.len() {
        if partition.find(i) != first {
            return Err(PatternError::Disconnected(clauses[i].root));
        }
    }
    Ok(())
}

/// Groups the clauses into components connected without evaluatable
/// clauses. Each evaluatable clause joins the component holding all of its
/// variables; the ones whose variables span components are returned apart.
fn structural_components(clauses: &[ProbedClause]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut partition = Partition::new(clauses.len());
    let owner = partition.join_shared(clauses, |c| !c.evaluatable);

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut spanning = Vec::new();
    for (i, clause) in clauses.iter().enumerate() {
        let home = if clause.evaluatable {
            let homes: BTreeSet<usize> = clause
                .variables
                .iter()
                .filter_map(|v| owner.get(v).copied())
                .map(|j| partition.find(j))
                .collect();
            match (homes.len(), homes.first()) {
                (1, Some(&home)) => home,
                _ => {
                    spanning.push(i);
                    continue;
                }
            }
        } else {
            partition.find(i)
        };
        match groups.iter_mut().find(|(rep, _)| *rep == home) {
            Some((_, members)) => members.push(i),
            None => groups.push((home, vec![i])),
        }
    }
    (groups.into_iter().map(|(_, members)| members).collect(), spanning)
}
