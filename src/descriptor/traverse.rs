//! Multi-hop descriptor traversal.
//!
//! [`Descriptor::build_related`] goes one level deep. [`traverse`] keeps
//! going breadth-first, building and reading one descriptor per reachable
//! subject, with a depth limit, a size limit, and a visited set keyed by
//! subject IRI so cyclic relation graphs terminate.

use std::collections::{HashSet, VecDeque};

use crate::error::SyncResult;
use crate::fact::FactKind;
use crate::store::FactStore;

use super::Descriptor;

/// Configuration for a descriptor traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Maximum hop depth from the root.
    pub max_depth: usize,
    /// Maximum number of descriptors to build.
    pub max_descriptors: usize,
    /// Fact kinds to follow. Kinds a descriptor does not hold are skipped.
    pub kinds: Vec<FactKind>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_descriptors: 1_000,
            kinds: vec![FactKind::ObjectRelation],
        }
    }
}

/// Result of a traversal.
#[derive(Debug)]
pub struct TraversalResult<S: FactStore + ?Sized> {
    /// Every descriptor built, in discovery order. The root is not included.
    pub descriptors: Vec<Descriptor<S>>,
    /// IRIs of the root and of every subject a descriptor was built for.
    pub visited: HashSet<String>,
    /// Maximum depth actually reached.
    pub depth_reached: usize,
}

impl<S: FactStore + ?Sized> TraversalResult<S> {
    /// Look up a built descriptor by short name.
    pub fn get(&self, name: &str) -> Option<&Descriptor<S>> {
        self.descriptors.iter().find(|d| d.subject().name() == name)
    }
}

/// Breadth-first traversal from `root` over its buffered relations.
///
/// The root itself is not re-read; read it first if its buffer should
/// reflect the store.
pub fn traverse<S: FactStore + ?Sized>(
    root: &Descriptor<S>,
    config: &TraversalConfig,
) -> SyncResult<TraversalResult<S>> {
    let root_iri = root.subject().iri().to_string();
    // Queued or built; `visited` only gains a subject once it is built.
    let mut seen: HashSet<String> = HashSet::from([root_iri.clone()]);
    let mut visited: HashSet<String> = HashSet::from([root_iri]);
    let mut descriptors: Vec<Descriptor<S>> = Vec::new();
    let mut depth_reached = 0;

    // (index into `descriptors`, depth); `None` is the root.
    let mut queue: VecDeque<(Option<usize>, usize)> = VecDeque::new();
    queue.push_back((None, 0));

    'bfs: while let Some((index, depth)) = queue.pop_front() {
        if depth >= config.max_depth {
            continue;
        }
        let current = match index {
            Some(i) => &descriptors[i],
            None => root,
        };

        let mut next = Vec::new();
        for &kind in &config.kinds {
            if !kind.is_relational() || !current.capabilities().supports(kind) {
                continue;
            }
            for name in current.related_names(kind) {
                let iri = current.store().resolve_name(&name).iri().to_string();
                if seen.insert(iri) {
                    next.push(current.spawn(&name, kind));
                }
            }
        }

        for mut related in next {
            if descriptors.len() >= config.max_descriptors {
                break 'bfs;
            }
            related.read_semantic()?;
            visited.insert(related.subject().iri().to_string());
            depth_reached = depth_reached.max(depth + 1);
            descriptors.push(related);
            queue.push_back((Some(descriptors.len() - 1), depth + 1));
        }
    }

    tracing::debug!(
        root = %root.subject(),
        built = descriptors.len(),
        depth = depth_reached,
        "descriptor traversal finished"
    );

    Ok(TraversalResult {
        descriptors,
        visited,
        depth_reached,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fact::Fact;
    use crate::store::MemFactStore;

    fn linked_rooms() -> Arc<MemFactStore> {
        // Room1 -> Room2 -> Room3 -> Room1
        let store = Arc::new(MemFactStore::new("t", "http://example.org/rooms"));
        for (from, to) in [("Room1", "Room2"), ("Room2", "Room3"), ("Room3", "Room1")] {
            let mut d = Descriptor::individual(from, Arc::clone(&store));
            d.add_fact(Fact::object("isLinkedTo", to)).unwrap();
            d.write_semantic().unwrap();
        }
        store
    }

    #[test]
    fn cycle_terminates() {
        let store = linked_rooms();
        let mut root = Descriptor::individual("Room1", store);
        root.read_semantic().unwrap();

        let result = traverse(&root, &TraversalConfig::default()).unwrap();
        assert_eq!(result.descriptors.len(), 2);
        assert_eq!(result.visited.len(), 3);
        assert_eq!(result.depth_reached, 2);
        assert_eq!(result.get("Room3").unwrap().object("isLinkedTo"), Some("Room1"));
    }

    #[test]
    fn depth_limit_respected() {
        let store = linked_rooms();
        let mut root = Descriptor::individual("Room1", store);
        root.read_semantic().unwrap();

        let config = TraversalConfig {
            max_depth: 1,
            ..Default::default()
        };
        let result = traverse(&root, &config).unwrap();
        assert_eq!(result.descriptors.len(), 1);
        assert!(result.get("Room2").is_some());
    }

    #[test]
    fn size_limit_respected() {
        let store = linked_rooms();
        let mut root = Descriptor::individual("Room1", store);
        root.read_semantic().unwrap();

        let config = TraversalConfig {
            max_descriptors: 1,
            ..Default::default()
        };
        assert_eq!(traverse(&root, &config).unwrap().descriptors.len(), 1);
    }

    #[test]
    fn size_limit_leaves_unbuilt_subjects_unvisited() {
        let store = Arc::new(MemFactStore::new("t", "http://example.org/rooms"));
        let mut hub = Descriptor::individual("Hub", Arc::clone(&store));
        for room in ["Room1", "Room2", "Room3"] {
            hub.add_fact(Fact::object("isLinkedTo", room)).unwrap();
        }
        hub.write_semantic().unwrap();

        let config = TraversalConfig {
            max_descriptors: 1,
            ..Default::default()
        };
        let result = traverse(&hub, &config).unwrap();
        assert_eq!(result.descriptors.len(), 1);
        assert_eq!(result.visited.len(), result.descriptors.len() + 1);
        assert!(result.visited.contains("http://example.org/rooms#Room1"));
        assert!(!result.visited.contains("http://example.org/rooms#Room2"));
    }

    #[test]
    fn unread_root_yields_nothing() {
        let root = Descriptor::individual("Room1", linked_rooms());
        let result = traverse(&root, &TraversalConfig::default()).unwrap();
        assert!(result.descriptors.is_empty());
        assert_eq!(result.depth_reached, 0);
    }
}
