//! Instantiating rewrite templates.
//!
//! A template is an ordinary atom holding pattern variables. Instantiating
//! it under a grounding builds the atom the grounding describes, adding
//! whatever links are missing to the store. Globs splice their run into
//! the enclosing link. A `Quote` wrapper copies its contents literally and
//! is itself dropped; an `Unquote` inside it substitutes again.

use crate::arena::Handle;
use crate::atom::AtomType;
use crate::atomspace::AtomSpace;
use crate::error::AtomSpaceResult;
use crate::grounding::{Binding, Grounding};
use tracing::trace;

/// Builds `template` under `grounding`. The result is a single atom unless
/// the template is itself a glob, which yields its run.
pub fn instantiate(space: &AtomSpace, template: Handle, grounding: &Grounding) -> AtomSpaceResult<Vec<Handle>> {
    let built = build(space, template, grounding, false)?;
    trace!(template = %space.render(template), built = built.len(), "template instantiated");
    Ok(built)
}

fn build(space: &AtomSpace, h: Handle, grounding: &Grounding, quoted: bool) -> AtomSpaceResult<Vec<Handle>> {
    if !quoted {
        match grounding.variables.get(&h) {
            Some(Binding::Atom(g)) => return Ok(vec![*g]),
            Some(Binding::Seq(seq)) => return Ok(seq.clone()),
            None => {}
        }
    }
    let atom = space.get(h)?;
    if atom.is_node() {
        return Ok(vec![h]);
    }
    match atom.atom_type {
        AtomType::Quote if !quoted && atom.arity() == 1 => return build(space, atom.outgoing[0], grounding, true),
        AtomType::Unquote if quoted && atom.arity() == 1 => return build(space, atom.outgoing[0], grounding, false),
        _ => {}
    }
    if !quoted && !space.contains_variables(h) {
        return Ok(vec![h]);
    }

    let mut children = Vec::with_capacity(atom.arity());
    for child in atom.outgoing.iter() {
        children.extend(build(space, *child, grounding, quoted)?);
    }
    Ok(vec![space.add_link(atom.atom_type, children)?])
}
