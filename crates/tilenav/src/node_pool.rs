//! Node pool and open list for the corridor search

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::PolyRef;

/// Node flags for pathfinding state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const OPEN: NodeFlags = NodeFlags(0x01);
    pub const CLOSED: NodeFlags = NodeFlags(0x02);

    pub fn contains(&self, flag: NodeFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: NodeFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: NodeFlags) {
        self.0 &= !flag.0;
    }
}

/// Node index type
pub type NodeIndex = usize;

/// Node in the search graph, one per visited polygon
#[derive(Debug, Clone)]
pub struct Node {
    /// Position the polygon was entered at
    pub pos: [f32; 3],
    /// Cost from the start polygon
    pub cost: f32,
    /// Cost plus heuristic
    pub total: f32,
    /// Parent node
    pub parent: Option<NodeIndex>,
    pub flags: NodeFlags,
    /// Polygon the node corresponds to
    pub id: PolyRef,
}

/// Bounded pool of search nodes keyed by polygon
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<Node>,
    lookup: HashMap<PolyRef, NodeIndex>,
    max_nodes: usize,
}

impl NodePool {
    pub fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            lookup: HashMap::new(),
            max_nodes,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.lookup.clear();
    }

    /// Gets the node of a polygon, allocating it on first use
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn get_node(&mut self, id: PolyRef) -> Option<NodeIndex> {
        if let Some(&index) = self.lookup.get(&id) {
            return Some(index);
        }
        if self.nodes.len() >= self.max_nodes {
            return None;
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            pos: [0.0; 3],
            cost: 0.0,
            total: 0.0,
            parent: None,
            flags: NodeFlags::default(),
            id,
        });
        self.lookup.insert(id, index);
        Some(index)
    }

    pub fn find_node(&self, id: PolyRef) -> Option<NodeIndex> {
        self.lookup.get(&id).copied()
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

/// Open list entry
#[derive(Debug, Clone, Copy)]
struct HeapNode {
    total: f32,
    id: PolyRef,
    index: NodeIndex,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: lowest total first, then lowest polygon
        other
            .total
            .total_cmp(&self.total)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Priority queue of open nodes
///
/// Nodes whose cost improves are pushed again; stale entries are skipped on
/// pop by comparing against the node's current total.
#[derive(Debug, Default)]
pub struct NodeQueue {
    heap: BinaryHeap<HeapNode>,
}

impl NodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn push(&mut self, pool: &NodePool, index: NodeIndex) {
        let node = pool.node(index);
        self.heap.push(HeapNode {
            total: node.total,
            id: node.id,
            index,
        });
    }

    /// Pops the best open node
    pub fn pop(&mut self, pool: &NodePool) -> Option<NodeIndex> {
        while let Some(entry) = self.heap.pop() {
            let node = pool.node(entry.index);
            if node.flags.contains(NodeFlags::OPEN) && node.total == entry.total {
                return Some(entry.index);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
