//! Lock forest over a sequence of elements.
//!
//! An element may be absolutely locked (it never moves) and relatively
//! locked to a parent element (it moves rigidly with its parent). Relative
//! locks form a forest whose nodes are referenced by [`OpticsId`]; all the
//! functions here take the element sequence that owns the nodes, so clones
//! of a sequence carry an independent copy of the forest.

use thiserror::Error;

use super::{Optics, OpticsId};

#[derive(Debug, Error, PartialEq)]
pub enum LockError {
    #[error("element {index} does not exist ({len} elements)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("locking {index} to {target} would create a cycle")]
    Cycle { index: usize, target: usize },
}

fn check_index(optics: &[Optics], index: usize) -> Result<(), LockError> {
    if index < optics.len() {
        Ok(())
    } else {
        Err(LockError::IndexOutOfRange {
            index,
            len: optics.len(),
        })
    }
}

/// Current index of the element with `id`.
pub fn index_of(optics: &[Optics], id: OpticsId) -> Option<usize> {
    optics.iter().position(|o| o.id == id)
}

/// Index of the root of the tree containing `index`.
pub fn root(optics: &[Optics], index: usize) -> usize {
    let mut current = index;
    // Bounded walk: a well-formed forest never has a path longer than its size
    for _ in 0..optics.len() {
        match optics[current].parent.and_then(|id| index_of(optics, id)) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// Indices of `index` and all its descendants, parents before children.
pub fn subtree(optics: &[Optics], index: usize) -> Vec<usize> {
    let mut nodes = vec![index];
    let mut next = 0;
    while next < nodes.len() {
        let current = nodes[next];
        for child in &optics[current].children {
            if let Some(child_index) = index_of(optics, *child) {
                if !nodes.contains(&child_index) {
                    nodes.push(child_index);
                }
            }
        }
        next += 1;
    }
    nodes
}

/// Whether `candidate` is `index` itself or one of its descendants.
pub fn is_descendant(optics: &[Optics], index: usize, candidate: usize) -> bool {
    subtree(optics, index).contains(&candidate)
}

/// Whether `index` and `other` belong to the same lock tree.
pub fn same_tree(optics: &[Optics], index: usize, other: usize) -> bool {
    root(optics, index) == root(optics, other)
}

/// Whether the tree containing `index` is absolutely locked.
///
/// Only the root's flag matters: relative locking clears the absolute lock.
pub fn is_tree_locked(optics: &[Optics], index: usize) -> bool {
    optics[root(optics, index)].absolute_lock
}

/// Detach `index` from its parent. Returns whether it had one.
pub fn relative_unlock(optics: &mut [Optics], index: usize) -> bool {
    let Some(parent_id) = optics[index].parent.take() else {
        return false;
    };
    let id = optics[index].id;
    if let Some(parent) = index_of(optics, parent_id) {
        optics[parent].children.retain(|child| *child != id);
    }
    true
}

/// Lock `index` relative to `target`.
///
/// Fails without mutation if `target` is `index` or one of its descendants.
/// Otherwise the previous parent link is replaced and the absolute lock of
/// `index` cleared.
pub fn relative_lock_to(optics: &mut [Optics], index: usize, target: usize) -> Result<(), LockError> {
    check_index(optics, index)?;
    check_index(optics, target)?;
    if is_descendant(optics, index, target) {
        return Err(LockError::Cycle { index, target });
    }
    relative_unlock(optics, index);
    let (id, target_id) = (optics[index].id, optics[target].id);
    optics[index].parent = Some(target_id);
    optics[target].children.push(id);
    optics[index].absolute_lock = false;
    Ok(())
}

/// Set the absolute lock of `index`. Locking detaches it from its parent.
pub fn set_absolute_lock(optics: &mut [Optics], index: usize, locked: bool) {
    if locked {
        relative_unlock(optics, index);
    }
    optics[index].absolute_lock = locked;
}

/// Remove `index` from the forest: its children become roots and it is
/// detached from its parent.
pub fn detach(optics: &mut [Optics], index: usize) {
    relative_unlock(optics, index);
    let children = std::mem::take(&mut optics[index].children);
    for child in children {
        if let Some(child_index) = index_of(optics, child) {
            optics[child_index].parent = None;
        }
    }
}

/// Translate `index` and all its descendants by `delta`.
pub fn move_descendants(optics: &mut [Optics], index: usize, delta: f64) {
    for node in subtree(optics, index) {
        let position = optics[node].position();
        optics[node].set_position(position + delta);
    }
}

/// Move `index` to `position`.
///
/// Respecting locks, the whole tree translates rigidly and nothing moves if
/// the tree is absolutely locked. Returns whether anything moved.
pub fn set_position(optics: &mut [Optics], index: usize, position: f64, respect_locks: bool) -> bool {
    if !respect_locks {
        optics[index].set_position(position);
        return true;
    }
    if is_tree_locked(optics, index) {
        return false;
    }
    let delta = position - optics[index].position();
    move_descendants(optics, root(optics, index), delta);
    true
}

/// Indented listing of the forest, one element per line.
pub fn tree_report(optics: &[Optics]) -> String {
    fn walk(optics: &[Optics], index: usize, depth: usize, out: &mut String) {
        let o = &optics[index];
        out.push_str(&"  ".repeat(depth));
        out.push_str(o.name());
        if o.absolute_lock {
            out.push_str(" [locked]");
        }
        out.push('\n');
        for child in &o.children {
            if let Some(child_index) = index_of(optics, *child) {
                walk(optics, child_index, depth + 1, out);
            }
        }
    }

    let mut out = String::new();
    for index in 0..optics.len() {
        if optics[index].parent.is_none() {
            walk(optics, index, 0, &mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Optics> {
        let mut optics = vec![
            Optics::lens(0.1, 0.1, "L1"),
            Optics::lens(0.1, 0.2, "L2"),
            Optics::lens(0.1, 0.3, "L3"),
            Optics::lens(0.1, 0.4, "L4"),
        ];
        for (i, o) in optics.iter_mut().enumerate() {
            o.id = i as OpticsId + 1;
        }
        optics
    }

    #[test]
    fn test_lock_chain_and_cycle_rejected() {
        let mut optics = chain();
        // L1 -> L2 -> L3
        relative_lock_to(&mut optics, 0, 1).unwrap();
        relative_lock_to(&mut optics, 1, 2).unwrap();
        assert_eq!(root(&optics, 0), 2);
        assert_eq!(
            relative_lock_to(&mut optics, 2, 0),
            Err(LockError::Cycle { index: 2, target: 0 })
        );
        assert_eq!(optics[2].parent(), None);
        assert_eq!(
            relative_lock_to(&mut optics, 1, 1),
            Err(LockError::Cycle { index: 1, target: 1 })
        );
    }

    #[test]
    fn test_relock_replaces_parent() {
        let mut optics = chain();
        relative_lock_to(&mut optics, 0, 1).unwrap();
        relative_lock_to(&mut optics, 0, 3).unwrap();
        assert_eq!(optics[0].parent(), Some(4));
        assert!(optics[1].children().is_empty());
        assert_eq!(optics[3].children(), &[1]);
    }

    #[test]
    fn test_absolute_and_relative_locks_exclusive() {
        let mut optics = chain();
        set_absolute_lock(&mut optics, 0, true);
        relative_lock_to(&mut optics, 0, 1).unwrap();
        assert!(!optics[0].absolute_lock());
        set_absolute_lock(&mut optics, 0, true);
        assert_eq!(optics[0].parent(), None);
        assert!(optics[1].children().is_empty());
    }

    #[test]
    fn test_tree_moves_rigidly() {
        let mut optics = chain();
        relative_lock_to(&mut optics, 0, 1).unwrap();
        relative_lock_to(&mut optics, 2, 1).unwrap();
        assert!(set_position(&mut optics, 0, 0.15, true));
        assert!((optics[0].position() - 0.15).abs() < 1e-15);
        assert!((optics[1].position() - 0.25).abs() < 1e-15);
        assert!((optics[2].position() - 0.35).abs() < 1e-15);
        assert!((optics[3].position() - 0.4).abs() < 1e-15);
    }

    #[test]
    fn test_locked_tree_does_not_move() {
        let mut optics = chain();
        relative_lock_to(&mut optics, 0, 1).unwrap();
        set_absolute_lock(&mut optics, 1, true);
        assert!(!set_position(&mut optics, 0, 0.5, true));
        assert_eq!(optics[0].position(), 0.1);
        // Ignoring locks moves the element alone
        assert!(set_position(&mut optics, 0, 0.5, false));
        assert_eq!(optics[0].position(), 0.5);
        assert_eq!(optics[1].position(), 0.2);
    }

    #[test]
    fn test_detach_frees_children() {
        let mut optics = chain();
        relative_lock_to(&mut optics, 0, 1).unwrap();
        relative_lock_to(&mut optics, 1, 2).unwrap();
        detach(&mut optics, 1);
        assert_eq!(optics[0].parent(), None);
        assert!(optics[2].children().is_empty());
        assert!(!same_tree(&optics, 0, 2));
    }

    #[test]
    fn test_tree_report_indents_children() {
        let mut optics = chain();
        relative_lock_to(&mut optics, 0, 1).unwrap();
        set_absolute_lock(&mut optics, 1, true);
        let report = tree_report(&optics);
        assert_eq!(report, "L2 [locked]\n  L1\nL3\nL4\n");
    }

    #[test]
    fn test_index_checks() {
        let mut optics = chain();
        assert_eq!(
            relative_lock_to(&mut optics, 0, 9),
            Err(LockError::IndexOutOfRange { index: 9, len: 4 })
        );
    }
}
