//! Scheduling helpers for callers that rebuild graphs on every edit
//!
//! Building is synchronous and pure. When builds are pushed onto another
//! thread, [`Supersession`] makes sure only the newest request's graph is
//! surfaced; [`GraphCache`] skips rebuilding a solution already seen.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::Result;
use crate::flow_graph::{BuildOptions, FlowGraph, FlowGraphBuilder};
use crate::models::ProductionLineSolution;

/// Hands out tickets; issuing a ticket supersedes every earlier one
#[derive(Debug, Clone, Default)]
pub struct Supersession {
    latest: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl Supersession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}

/// Build `solution` on behalf of `ticket`. Returns `None` when a newer
/// request was issued before or during the build.
pub fn run_latest(
    ticket: &Ticket,
    solution: &ProductionLineSolution,
    builder: &FlowGraphBuilder<'_>,
) -> Option<FlowGraph> {
    if !ticket.is_current() {
        debug!(generation = ticket.generation, "skipping superseded build");
        return None;
    }
    let graph = builder.build(solution);
    if ticket.is_current() {
        Some(graph)
    } else {
        debug!(generation = ticket.generation, "discarding superseded graph");
        None
    }
}

/// Content hash of a solution together with the options it is built under
pub fn fingerprint(solution: &ProductionLineSolution, options: &BuildOptions) -> Result<u64> {
    Ok(hash_content(&serde_json::to_vec(solution)?, options))
}

fn hash_content(bytes: &[u8], options: &BuildOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    options.leftover_threshold.to_bits().hash(&mut hasher);
    options.conservation_tolerance.to_bits().hash(&mut hasher);
    options.raw_bypass.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug)]
struct CacheEntry {
    key: u64,
    /// Serialized solution; a matching key alone is not trusted
    content: Vec<u8>,
    options: BuildOptions,
    graph: Arc<FlowGraph>,
}

impl CacheEntry {
    fn matches(&self, key: u64, content: &[u8], options: &BuildOptions) -> bool {
        self.key == key && self.options == *options && self.content == content
    }
}

/// Small most-recently-used cache of built graphs. Assumes the builder's
/// catalog does not change for the cache's lifetime.
#[derive(Debug)]
pub struct GraphCache {
    capacity: usize,
    entries: VecDeque<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl GraphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get_or_build(
        &mut self,
        solution: &ProductionLineSolution,
        builder: &FlowGraphBuilder<'_>,
    ) -> Result<Arc<FlowGraph>> {
        let options = *builder.options();
        let content = serde_json::to_vec(solution)?;
        let key = hash_content(&content, &options);

        let found = self
            .entries
            .iter()
            .position(|e| e.matches(key, &content, &options));
        if let Some(entry) = found.and_then(|pos| self.entries.remove(pos)) {
            self.hits += 1;
            let graph = Arc::clone(&entry.graph);
            self.entries.push_front(entry);
            return Ok(graph);
        }

        self.misses += 1;
        let graph = Arc::new(builder.build(solution));
        self.entries.push_front(CacheEntry {
            key,
            content,
            options,
            graph: Arc::clone(&graph),
        });
        self.entries.truncate(self.capacity);
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_graph::RawBypass;
    use crate::models::{CycleDuration, RecipeDefinition};

    fn solution(scale: f64) -> ProductionLineSolution {
        ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Ingot", CycleDuration::new(60.0).unwrap())
                    .ingredient(155, 10.0)
                    .product(10, 10.0),
                scale,
            )
            .with_raw(155, 10.0 * scale)
            .with_target(10, 10.0 * scale)
    }

    #[test]
    fn newer_ticket_supersedes_older() {
        let supersession = Supersession::new();
        let first = supersession.issue();
        assert!(first.is_current());

        let second = supersession.issue();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.generation() > first.generation());

        let builder = FlowGraphBuilder::default();
        assert!(run_latest(&first, &solution(1.0), &builder).is_none());
        assert!(run_latest(&second, &solution(2.0), &builder).is_some());
    }

    #[test]
    fn stale_worker_result_is_dropped() {
        let supersession = Supersession::new();
        let stale = supersession.issue();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

        let result = std::thread::scope(|scope| {
            let worker = scope.spawn(move || {
                ready_tx.send(()).ok();
                go_rx.recv().ok();
                run_latest(&stale, &solution(1.0), &FlowGraphBuilder::default())
            });
            ready_rx.recv().ok();
            let _fresh = supersession.issue();
            go_tx.send(()).ok();
            worker.join().unwrap()
        });

        assert!(result.is_none());
    }

    #[test]
    fn cache_reuses_identical_solutions() {
        let builder = FlowGraphBuilder::default();
        let mut cache = GraphCache::new(2);

        let a = cache.get_or_build(&solution(1.0), &builder).unwrap();
        let again = cache.get_or_build(&solution(1.0), &builder).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        cache.get_or_build(&solution(2.0), &builder).unwrap();
        cache.get_or_build(&solution(3.0), &builder).unwrap();
        assert_eq!(cache.len(), 2);

        // evicted, so rebuilt
        let rebuilt = cache.get_or_build(&solution(1.0), &builder).unwrap();
        assert!(!Arc::ptr_eq(&a, &rebuilt));
        assert_eq!(*a, *rebuilt);
    }

    #[test]
    fn colliding_key_does_not_return_other_graph() {
        let builder = FlowGraphBuilder::default();
        let options = *builder.options();
        let mut cache = GraphCache::new(4);

        // plant solution(1.0)'s graph under solution(2.0)'s key
        let planted = Arc::new(builder.build(&solution(1.0)));
        cache.entries.push_front(CacheEntry {
            key: fingerprint(&solution(2.0), &options).unwrap(),
            content: serde_json::to_vec(&solution(1.0)).unwrap(),
            options,
            graph: Arc::clone(&planted),
        });

        let graph = cache.get_or_build(&solution(2.0), &builder).unwrap();
        assert!(!Arc::ptr_eq(&planted, &graph));
        assert_eq!(*graph, builder.build(&solution(2.0)));
        assert_eq!((cache.hits(), cache.misses()), (0, 1));
    }

    #[test]
    fn fingerprint_depends_on_options() {
        let s = solution(1.0);
        let exclusive = BuildOptions::default();
        let additive = BuildOptions {
            raw_bypass: RawBypass::Additive,
            ..exclusive
        };
        assert_eq!(
            fingerprint(&s, &exclusive).unwrap(),
            fingerprint(&s, &exclusive).unwrap()
        );
        assert_ne!(
            fingerprint(&s, &exclusive).unwrap(),
            fingerprint(&s, &additive).unwrap()
        );
        assert_ne!(
            fingerprint(&s, &exclusive).unwrap(),
            fingerprint(&solution(2.0), &exclusive).unwrap()
        );
    }
}
