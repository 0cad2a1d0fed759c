//! Merging same-named children across layers.

use std::collections::HashMap;

use super::{is_pruned, is_replaced};
use crate::core::{MetaData, ObjectHeader, PropertyHeader};
use crate::util::Result;

/// Headers that can be merged by name.
pub(super) trait Mergeable: Clone {
    fn name(&self) -> &str;
    fn meta_data(&self) -> &MetaData;

    /// Whether a lower layer's entry may join this one.
    fn accepts(&self, _lower: &Self) -> bool {
        true
    }
}

impl Mergeable for ObjectHeader {
    fn name(&self) -> &str {
        &self.name
    }

    fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }
}

impl Mergeable for PropertyHeader {
    fn name(&self) -> &str {
        &self.name
    }

    fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    fn accepts(&self, lower: &Self) -> bool {
        self.property_type == lower.property_type
    }
}

/// Readers stacked at one path, highest priority first.
///
/// `primary` layers define the children and properties at the path.
/// `fallback` layers sit below a replacing layer: they add no names here, but
/// their same-named children join the matching child's `primary` stack.
pub(super) struct Stack<P> {
    pub(super) primary: Vec<P>,
    pub(super) fallback: Vec<P>,
}

impl<P> Stack<P> {
    pub(super) fn new(primary: Vec<P>) -> Self {
        Self {
            primary,
            fallback: Vec::new(),
        }
    }
}

/// Where one composed child comes from: `(parent, index in parent)` pairs.
pub(super) struct Entry<P, H> {
    /// Header of the highest-priority source.
    pub(super) header: H,
    pub(super) primary: Vec<(P, usize)>,
    pub(super) fallback: Vec<(P, usize)>,
    state: Override,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Override {
    Open,
    Replaced,
    Pruned,
}

fn override_of(md: &MetaData) -> Override {
    if is_pruned(md) {
        Override::Pruned
    } else if is_replaced(md) {
        Override::Replaced
    } else {
        Override::Open
    }
}

impl<P, H: Mergeable> Entry<P, H> {
    fn new(parent: P, index: usize, header: H) -> Self {
        let state = override_of(header.meta_data());
        Self {
            header,
            primary: vec![(parent, index)],
            fallback: Vec::new(),
            state,
        }
    }

    fn add(&mut self, parent: P, index: usize, header: &H) {
        if !self.header.accepts(header) {
            return;
        }
        match self.state {
            Override::Pruned => {}
            Override::Replaced => self.fallback.push((parent, index)),
            Override::Open => {
                self.primary.push((parent, index));
                self.state = override_of(header.meta_data());
            }
        }
    }
}

/// Merge the children of every layer in `stack` by name, in order of first
/// appearance. Fallback layers never introduce new names; a fallback child
/// with a known name merges like a primary one.
pub(super) fn compose<P, H>(
    stack: &Stack<P>,
    count: impl Fn(&P) -> usize,
    header: impl Fn(&P, usize) -> Result<H>,
) -> Result<Vec<Entry<P, H>>>
where
    P: Clone,
    H: Mergeable,
{
    let mut entries: Vec<Entry<P, H>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for parent in &stack.primary {
        for index in 0..count(parent) {
            let h = header(parent, index)?;
            match by_name.get(h.name()) {
                Some(&slot) => entries[slot].add(parent.clone(), index, &h),
                None => {
                    by_name.insert(h.name().to_string(), entries.len());
                    entries.push(Entry::new(parent.clone(), index, h));
                }
            }
        }
    }
    for parent in &stack.fallback {
        for index in 0..count(parent) {
            let h = header(parent, index)?;
            if let Some(&slot) = by_name.get(h.name()) {
                entries[slot].add(parent.clone(), index, &h);
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{set_prune, set_replace};

    fn header(name: &str) -> ObjectHeader {
        ObjectHeader::new(name, format!("/{name}"), MetaData::new())
    }

    fn pruned(name: &str) -> ObjectHeader {
        let mut h = header(name);
        set_prune(&mut h.meta_data, true);
        h
    }

    fn replaced(name: &str) -> ObjectHeader {
        let mut h = header(name);
        set_replace(&mut h.meta_data, true);
        h
    }

    fn run(
        layers: Vec<Vec<ObjectHeader>>,
        fallback: Vec<Vec<ObjectHeader>>,
    ) -> Vec<Entry<usize, ObjectHeader>> {
        let all: Vec<Vec<ObjectHeader>> = layers.iter().chain(fallback.iter()).cloned().collect();
        let stack = Stack {
            primary: (0..layers.len()).collect(),
            fallback: (layers.len()..all.len()).collect(),
        };
        compose(&stack, |&l| all[l].len(), |&l, i| Ok(all[l][i].clone())).unwrap()
    }

    #[test]
    fn test_merge_by_name() {
        let entries = run(
            vec![
                vec![header("a"), header("b")],
                vec![header("b"), header("c")],
            ],
            vec![],
        );
        let names: Vec<_> = entries.iter().map(|e| e.header.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(entries[1].primary, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_prune_stops_lower_layers() {
        let entries = run(
            vec![
                vec![pruned("geo")],
                vec![header("geo")],
            ],
            vec![],
        );
        assert_eq!(entries[0].primary, vec![(0, 0)]);
        assert!(entries[0].fallback.is_empty());
    }

    #[test]
    fn test_replace_moves_lower_layers_to_fallback() {
        let entries = run(
            vec![
                vec![replaced("geo")],
                vec![header("geo")],
            ],
            vec![],
        );
        assert_eq!(entries[0].primary, vec![(0, 0)]);
        assert_eq!(entries[0].fallback, vec![(1, 0)]);
    }

    #[test]
    fn test_fallback_joins_known_names_only() {
        let entries = run(
            vec![vec![header("a")]],
            vec![vec![header("a"), header("z")]],
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].primary, vec![(0, 0), (1, 0)]);
        assert!(entries[0].fallback.is_empty());
    }

    #[test]
    fn test_fallback_respects_lower_flags() {
        let entries = run(
            vec![vec![pruned("a"), header("b")]],
            vec![vec![header("a"), replaced("b")], vec![header("b")]],
        );
        assert_eq!(entries[0].primary, vec![(0, 0)]);
        assert_eq!(entries[1].primary, vec![(0, 1), (1, 1)]);
        assert_eq!(entries[1].fallback, vec![(2, 0)]);
    }
}
