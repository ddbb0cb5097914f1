//! Content hashing for atoms.
//!
//! Atom identity inside a store is structural: two atoms with the same type
//! and the same name (nodes) or the same children (links) are the same atom.
//! The store interns atoms by the SHA-256 content hash computed here.
//!
//! # Determinism
//! - Hashes depend only on type names, node names and child hashes, never on
//!   handles, so the same atom hashes identically in every store.
//! - Every hash is domain separated and length prefixed.

use crate::atom::AtomType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of `data` with domain separation.
    ///
    /// The hashed message is `b"HM:" || domain || b":v1" || len(data) || data`
    /// with a 64-bit little-endian length prefix.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"HM:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Content hash of a node.
pub fn node_content_hash(atom_type: AtomType, name: &str) -> HashValue {
    let type_name = atom_type.name().as_bytes();
    let mut data = Vec::with_capacity(8 + type_name.len() + name.len());
    data.extend_from_slice(&(type_name.len() as u64).to_le_bytes());
    data.extend_from_slice(type_name);
    data.extend_from_slice(name.as_bytes());
    HashValue::hash_with_domain(b"NODE", &data)
}

/// Content hash of a link, given the hashes of its children in outgoing
/// order.
///
/// Callers hashing an unordered link must pass the children already in
/// canonical order (see `AtomSpace::add_link`).
pub fn link_content_hash(atom_type: AtomType, children: &[HashValue]) -> HashValue {
    let type_name = atom_type.name().as_bytes();
    let mut data = Vec::with_capacity(16 + type_name.len() + 32 * children.len());
    data.extend_from_slice(&(type_name.len() as u64).to_le_bytes());
    data.extend_from_slice(type_name);
    data.extend_from_slice(&(children.len() as u64).to_le_bytes());
    for child in children {
        data.extend_from_slice(child.as_bytes());
    }
    HashValue::hash_with_domain(b"LINK", &data)
}
