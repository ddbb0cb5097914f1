//! The atom store.
//!
//! `AtomSpace` interns nodes and links by content hash, keeps the incoming
//! set of every atom (the links that hold it as a child) and a per-type
//! index. All state sits behind one `parking_lot::RwLock`, so a shared
//! `&AtomSpace` can be read and extended from several threads while
//! independent searches run against it.
//!
//! # Invariants
//! - Every child of a live link is live.
//! - `h` is in the incoming set of `c` iff `c` is a child of live link `h`.
//! - Unordered links store their outgoing set in canonical (content hash)
//!   order; every insertion order of the same children yields one atom.
//! - Reads hand out owned snapshots (`Atom`, `Vec<Handle>`); a concurrent
//!   insert never mutates a sequence a reader already holds.

use crate::arena::{AtomArena, Handle};
use crate::atom::{Atom, AtomType};
use crate::error::{AtomSpaceError, AtomSpaceResult};
use crate::fingerprint::{link_content_hash, node_content_hash, HashValue};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct AtomRecord {
    atom: Atom,
    hash: HashValue,
    incoming: BTreeSet<Handle>,
    /// Holds a variable or glob somewhere below.
    has_variables: bool,
    sti: i16,
}

#[derive(Debug, Default)]
struct AtomTable {
    arena: AtomArena<AtomRecord>,
    index: HashMap<HashValue, Handle>,
    by_type: HashMap<AtomType, BTreeSet<Handle>>,
}

impl AtomTable {
    fn record(&self, handle: Handle) -> AtomSpaceResult<&AtomRecord> {
        self.arena
            .get(handle)
            .ok_or(AtomSpaceError::UnknownHandle(handle))
    }

    /// Canonical outgoing set, content hash and variable flag of a link.
    fn link_key(&self, atom_type: AtomType, mut outgoing: Vec<Handle>) -> AtomSpaceResult<(Vec<Handle>, HashValue, bool)> {
        let mut keyed = Vec::with_capacity(outgoing.len());
        let mut has_variables = false;
        for child in &outgoing {
            let record = self.arena.get(*child).ok_or(AtomSpaceError::MissingChild {
                link_type: atom_type,
                child: *child,
            })?;
            has_variables |= record.has_variables;
            keyed.push((record.hash, *child));
        }
        if atom_type.is_unordered() {
            keyed.sort();
            outgoing = keyed.iter().map(|(_, h)| *h).collect();
        }
        let child_hashes: Vec<HashValue> = keyed.iter().map(|(hash, _)| *hash).collect();
        Ok((outgoing, link_content_hash(atom_type, &child_hashes), has_variables))
    }

    fn insert(&mut self, record: AtomRecord) -> Handle {
        let atom_type = record.atom.atom_type;
        let hash = record.hash;
        let children = record.atom.outgoing.clone();
        let handle = self.arena.allocate(record);
        for child in children.iter() {
            if let Some(child_record) = self.arena.get_mut(*child) {
                child_record.incoming.insert(handle);
            }
        }
        self.index.insert(hash, handle);
        self.by_type.entry(atom_type).or_default().insert(handle);
        handle
    }

    fn remove_one(&mut self, handle: Handle) -> Option<AtomRecord> {
        let record = self.arena.deallocate(handle)?;
        for child in record.atom.outgoing.iter() {
            if let Some(child_record) = self.arena.get_mut(*child) {
                child_record.incoming.remove(&handle);
            }
        }
        self.index.remove(&record.hash);
        if let Some(set) = self.by_type.get_mut(&record.atom.atom_type) {
            set.remove(&handle);
        }
        Some(record)
    }
}

/// Shared, interning hypergraph store.
#[derive(Debug, Default)]
pub struct AtomSpace {
    table: RwLock<AtomTable>,
}

impl AtomSpace {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live atoms.
    pub fn len(&self) -> usize {
        self.table.read().arena.live_count()
    }

    /// True if the store holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a node, or returns the existing one with the same type and name.
    pub fn add_node(&self, atom_type: AtomType, name: &str) -> AtomSpaceResult<Handle> {
        if !atom_type.is_node() {
            return Err(AtomSpaceError::NotANodeType(atom_type));
        }
        let hash = node_content_hash(atom_type, name);
        if let Some(handle) = self.table.read().index.get(&hash) {
            return Ok(*handle);
        }
        let mut table = self.table.write();
        if let Some(handle) = table.index.get(&hash) {
            return Ok(*handle);
        }
        let record = AtomRecord {
            atom: Atom {
                atom_type,
                name: Some(Arc::from(name)),
                outgoing: Arc::from(Vec::new()),
            },
            hash,
            incoming: BTreeSet::new(),
            has_variables: atom_type.is_variable(),
            sti: 0,
        };
        let handle = table.insert(record);
        trace!(%handle, %atom_type, name, "added node");
        Ok(handle)
    }

    /// Adds a link, or returns the existing one with the same type and
    /// children.
    ///
    /// Children of unordered links are put in canonical order first.
    pub fn add_link(&self, atom_type: AtomType, outgoing: impl Into<Vec<Handle>>) -> AtomSpaceResult<Handle> {
        if !atom_type.is_link() {
            return Err(AtomSpaceError::NotALinkType(atom_type));
        }
        let mut table = self.table.write();
        let (outgoing, hash, has_variables) = table.link_key(atom_type, outgoing.into())?;
        if let Some(handle) = table.index.get(&hash) {
            return Ok(*handle);
        }
        let record = AtomRecord {
            atom: Atom {
                atom_type,
                name: None,
                outgoing: Arc::from(outgoing),
            },
            hash,
            incoming: BTreeSet::new(),
            has_variables,
            sti: 0,
        };
        let handle = table.insert(record);
        trace!(%handle, %atom_type, "added link");
        Ok(handle)
    }

    /// Looks up a node without inserting it.
    pub fn get_node(&self, atom_type: AtomType, name: &str) -> Option<Handle> {
        let hash = node_content_hash(atom_type, name);
        self.table.read().index.get(&hash).copied()
    }

    /// Looks up a link without inserting it.
    pub fn get_link(&self, atom_type: AtomType, outgoing: impl Into<Vec<Handle>>) -> Option<Handle> {
        if !atom_type.is_link() {
            return None;
        }
        let table = self.table.read();
        let (_, hash, _) = table.link_key(atom_type, outgoing.into()).ok()?;
        table.index.get(&hash).copied()
    }

    /// Snapshot of an atom.
    pub fn get(&self, handle: Handle) -> AtomSpaceResult<Atom> {
        Ok(self.table.read().record(handle)?.atom.clone())
    }

    /// True if `handle` names a live atom.
    pub fn contains(&self, handle: Handle) -> bool {
        self.table.read().arena.get(handle).is_some()
    }

    /// Type of an atom.
    pub fn atom_type(&self, handle: Handle) -> Option<AtomType> {
        self.table.read().arena.get(handle).map(|r| r.atom.atom_type)
    }

    /// Name of a node; `None` for links and unknown handles.
    pub fn name(&self, handle: Handle) -> Option<Arc<str>> {
        self.table
            .read()
            .arena
            .get(handle)
            .and_then(|r| r.atom.name.clone())
    }

    /// True if the atom is a node.
    pub fn is_node(&self, handle: Handle) -> bool {
        self.atom_type(handle).is_some_and(AtomType::is_node)
    }

    /// True if the atom is a link.
    pub fn is_link(&self, handle: Handle) -> bool {
        self.atom_type(handle).is_some_and(AtomType::is_link)
    }

    /// Outgoing set; empty for nodes and unknown handles.
    pub fn outgoing(&self, handle: Handle) -> Arc<[Handle]> {
        self.table
            .read()
            .arena
            .get(handle)
            .map(|r| r.atom.outgoing.clone())
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Number of children.
    pub fn arity(&self, handle: Handle) -> usize {
        self.table
            .read()
            .arena
            .get(handle)
            .map_or(0, |r| r.atom.outgoing.len())
    }

    /// Links that hold `handle` as a child, in handle order.
    pub fn incoming_set(&self, handle: Handle) -> Vec<Handle> {
        self.table
            .read()
            .arena
            .get(handle)
            .map(|r| r.incoming.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Incoming links of the given type.
    pub fn incoming_by_type(&self, handle: Handle, atom_type: AtomType) -> Vec<Handle> {
        let table = self.table.read();
        let Some(record) = table.arena.get(handle) else {
            return Vec::new();
        };
        record
            .incoming
            .iter()
            .copied()
            .filter(|h| table.arena.get(*h).is_some_and(|r| r.atom.atom_type == atom_type))
            .collect()
    }

    /// Size of the incoming set.
    pub fn incoming_set_size(&self, handle: Handle) -> usize {
        self.table
            .read()
            .arena
            .get(handle)
            .map_or(0, |r| r.incoming.len())
    }

    /// All atoms of exactly this type, in handle order.
    pub fn atoms_of_type(&self, atom_type: AtomType) -> Vec<Handle> {
        self.table
            .read()
            .by_type
            .get(&atom_type)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every live atom, in handle order.
    pub fn handles(&self) -> Vec<Handle> {
        self.table.read().arena.iter().map(|(h, _)| h).collect()
    }

    /// True if a variable or glob occurs anywhere in the atom.
    pub fn contains_variables(&self, handle: Handle) -> bool {
        self.table
            .read()
            .arena
            .get(handle)
            .is_some_and(|r| r.has_variables)
    }

    /// Content hash of an atom.
    pub fn content_hash(&self, handle: Handle) -> Option<HashValue> {
        self.table.read().arena.get(handle).map(|r| r.hash)
    }

    /// Sets the short-term importance of an atom.
    pub fn set_sti(&self, handle: Handle, sti: i16) -> AtomSpaceResult<()> {
        let mut table = self.table.write();
        let record = table
            .arena
            .get_mut(handle)
            .ok_or(AtomSpaceError::UnknownHandle(handle))?;
        record.sti = sti;
        Ok(())
    }

    /// Short-term importance; zero for unknown handles.
    pub fn sti(&self, handle: Handle) -> i16 {
        self.table.read().arena.get(handle).map_or(0, |r| r.sti)
    }

    /// Removes an atom.
    ///
    /// Without `recursive`, an atom that is still held by some link is left
    /// in place and `HasIncoming` is returned. With it, the incoming closure
    /// goes first. Returns the number of atoms removed.
    pub fn remove(&self, handle: Handle, recursive: bool) -> AtomSpaceResult<usize> {
        let mut table = self.table.write();
        let record = table.record(handle)?;
        if !recursive && !record.incoming.is_empty() {
            return Err(AtomSpaceError::HasIncoming {
                handle,
                incoming: record.incoming.len(),
            });
        }
        // Parents before children: post-order over the incoming closure.
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![(handle, false)];
        while let Some((h, expanded)) = stack.pop() {
            if expanded {
                order.push(h);
                continue;
            }
            if !seen.insert(h) {
                continue;
            }
            stack.push((h, true));
            if let Some(r) = table.arena.get(h) {
                for parent in r.incoming.iter() {
                    stack.push((*parent, false));
                }
            }
        }
        let mut removed = 0;
        for h in order {
            if table.remove_one(h).is_some() {
                removed += 1;
            }
        }
        debug!(%handle, removed, "removed atoms");
        Ok(removed)
    }

    /// Renders an atom as an s-expression, for logs and test failures.
    pub fn render(&self, handle: Handle) -> String {
        let table = self.table.read();
        let mut out = String::new();
        render_into(&table, handle, &mut out);
        out
    }
}

fn render_into(table: &AtomTable, handle: Handle, out: &mut String) {
    let Some(record) = table.arena.get(handle) else {
        let _ = write!(out, "(invalid {handle})");
        return;
    };
    let atom = &record.atom;
    match &atom.name {
        Some(name) => {
            let _ = write!(out, "({} \"{}\")", atom.atom_type, name);
        }
        None => {
            let _ = write!(out, "({}", atom.atom_type);
            for child in atom.outgoing.iter() {
                out.push(' ');
                render_into(table, *child, out);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nodes and links are interned by content.
    #[test]
    fn interning() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let a2 = space.add_node(AtomType::Concept, "A").unwrap();
        let pa = space.add_node(AtomType::Predicate, "A").unwrap();
        assert_eq!(a, a2);
        assert_ne!(a, pa);

        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let ab = space.add_link(AtomType::Edge, [a, b]).unwrap();
        assert_eq!(ab, space.add_link(AtomType::Edge, [a, b]).unwrap());
        assert_ne!(ab, space.add_link(AtomType::Edge, [b, a]).unwrap());
        assert_eq!(space.len(), 5);
    }

    /// Unordered links are the same atom whatever the insertion order.
    #[test]
    fn unordered_canonical_order() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let c = space.add_node(AtomType::Concept, "C").unwrap();
        let s1 = space.add_link(AtomType::Set, [a, b, c]).unwrap();
        let s2 = space.add_link(AtomType::Set, [c, a, b]).unwrap();
        let s3 = space.add_link(AtomType::Set, [b, c, a]).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1, s3);
        assert_eq!(space.arity(s1), 3);
    }

    /// Incoming sets track every parent, with type filtering.
    #[test]
    fn incoming_sets() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let e = space.add_link(AtomType::Edge, [a, b]).unwrap();
        let l = space.add_link(AtomType::List, [a]).unwrap();
        assert_eq!(space.incoming_set(a), vec![e, l]);
        assert_eq!(space.incoming_by_type(a, AtomType::List), vec![l]);
        assert_eq!(space.incoming_set_size(b), 1);
        assert!(space.incoming_set(e).is_empty());
    }

    /// Links over unknown children and type misuse are rejected.
    #[test]
    fn rejects_bad_atoms() {
        let space = AtomSpace::new();
        let ghost = Handle::new(42);
        assert_eq!(
            space.add_link(AtomType::List, [ghost]),
            Err(AtomSpaceError::MissingChild {
                link_type: AtomType::List,
                child: ghost
            })
        );
        assert_eq!(
            space.add_node(AtomType::List, "x"),
            Err(AtomSpaceError::NotANodeType(AtomType::List))
        );
        assert_eq!(
            space.add_link(AtomType::Concept, Vec::new()),
            Err(AtomSpaceError::NotALinkType(AtomType::Concept))
        );
    }

    /// Removal respects incoming sets unless recursive.
    #[test]
    fn removal() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let e = space.add_link(AtomType::Edge, [a, b]).unwrap();
        let outer = space.add_link(AtomType::List, [e]).unwrap();

        assert!(matches!(
            space.remove(a, false),
            Err(AtomSpaceError::HasIncoming { incoming: 1, .. })
        ));
        assert_eq!(space.remove(a, true).unwrap(), 3);
        assert!(!space.contains(e));
        assert!(!space.contains(outer));
        assert!(space.incoming_set(b).is_empty());
        assert_eq!(space.len(), 1);
    }

    /// Variable occurrence is tracked upward.
    #[test]
    fn variable_tracking() {
        let space = AtomSpace::new();
        let x = space.add_node(AtomType::Variable, "$x").unwrap();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let l = space.add_link(AtomType::List, [a, x]).unwrap();
        let plain = space.add_link(AtomType::List, [a]).unwrap();
        assert!(space.contains_variables(l));
        assert!(!space.contains_variables(plain));
    }

    /// Lookups never insert.
    #[test]
    fn lookup_without_insert() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let b = space.add_node(AtomType::Concept, "B").unwrap();
        let s = space.add_link(AtomType::Set, [a, b]).unwrap();
        assert_eq!(space.get_link(AtomType::Set, [b, a]), Some(s));
        assert_eq!(space.get_link(AtomType::List, [a, b]), None);
        assert_eq!(space.get_node(AtomType::Concept, "C"), None);
        assert_eq!(space.len(), 3);
        assert_eq!(space.handles(), vec![a, b, s]);
    }

    /// Rendering nests children.
    #[test]
    fn render() {
        let space = AtomSpace::new();
        let a = space.add_node(AtomType::Concept, "A").unwrap();
        let l = space.add_link(AtomType::List, [a]).unwrap();
        assert_eq!(space.render(l), "(ListLink (ConceptNode \"A\"))");
    }

    /// Concurrent inserts of the same atom intern to one handle.
    #[test]
    fn concurrent_interning() {
        let space = Arc::new(AtomSpace::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let space = Arc::clone(&space);
                std::thread::spawn(move || {
                    let a = space.add_node(AtomType::Concept, "A").unwrap();
                    let b = space.add_node(AtomType::Concept, "B").unwrap();
                    space.add_link(AtomType::Edge, [a, b]).unwrap()
                })
            })
            .collect();
        let results: BTreeSet<Handle> = handles.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(space.len(), 3);
    }
}
