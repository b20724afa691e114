//! Kademlia distance table of the peers this node talks to.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::common::{Node, NodeId};

/// K = the default maximum size of a bucket.
pub const KADEMLIA_BUCKET_SIZE: usize = 16;

#[derive(Debug, Clone)]
/// A peer in the [NodeDistanceTable].
pub struct DistanceTableEntry {
    node: Node,
    distance: u16,
    score: u64,
    last_seen: Instant,
}

impl DistanceTableEntry {
    fn new(node: Node, distance: u16) -> Self {
        Self {
            node,
            distance,
            score: 0,
            last_seen: Instant::now(),
        }
    }

    // === Getters ===

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Log distance between this entry and the local node.
    pub fn distance(&self) -> u16 {
        self.distance
    }

    /// Number of times this peer was seen alive since it was added.
    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    fn refresh(&mut self) {
        self.score += 1;
        self.last_seen = Instant::now();
    }
}

#[derive(Debug, Clone)]
/// Outcome of a mutation of the [NodeDistanceTable].
///
/// A failed insertion carries the entry occupying the slot the new node
/// wanted, so the caller can challenge it.
pub struct OperationResult {
    pub success: bool,
    pub affected_entry: DistanceTableEntry,
}

#[derive(Debug, Clone)]
/// Peers sharing the same distance to the local node.
pub struct NodeBucket {
    capacity: usize,
    entries: Vec<DistanceTableEntry>,
}

impl NodeBucket {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    fn add(&mut self, entry: DistanceTableEntry) -> OperationResult {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.node.id == entry.node.id)
        {
            existing.node.address = entry.node.address;
            existing.refresh();

            return OperationResult {
                success: true,
                affected_entry: existing.clone(),
            };
        }

        if self.entries.len() < self.capacity {
            self.entries.push(entry.clone());

            return OperationResult {
                success: true,
                affected_entry: entry,
            };
        }

        let affected_entry = self
            .entries
            .iter()
            .min_by_key(|e| e.last_seen)
            .cloned()
            .unwrap_or(entry);

        OperationResult {
            success: false,
            affected_entry,
        }
    }

    fn remove(&mut self, node_id: &NodeId) -> Option<DistanceTableEntry> {
        let index = self.entries.iter().position(|e| &e.node.id == node_id)?;

        Some(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[DistanceTableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

#[derive(Debug, Clone)]
/// Peers known to this node, bucketed by their log distance to the local node.
pub struct NodeDistanceTable {
    local_id: NodeId,
    bucket_size: usize,
    buckets: BTreeMap<u16, NodeBucket>,
}

impl NodeDistanceTable {
    /// Create a new table measuring distances from `local_id`.
    pub fn new(bucket_size: usize, local_id: NodeId) -> Self {
        Self {
            local_id,
            bucket_size,
            buckets: BTreeMap::new(),
        }
    }

    // === Getters ===

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Returns the bucket a node at `distance` from the local node belongs to.
    pub fn bucket(&self, distance: u16) -> Option<&NodeBucket> {
        self.buckets.get(&distance)
    }

    // === Public Methods ===

    /// Insert `node` if its bucket has room. A node already present gets its
    /// address updated and is marked as seen.
    ///
    /// When the bucket is full, fails and returns the least recently seen
    /// entry of that bucket.
    pub fn add_node(&mut self, node: &Node) -> OperationResult {
        let distance = self.local_id.distance(&node.id);
        let bucket_size = self.bucket_size;

        self.buckets
            .entry(distance)
            .or_insert_with(|| NodeBucket::new(bucket_size))
            .add(DistanceTableEntry::new(*node, distance))
    }

    /// Remove a node, returns the removed entry if it was present.
    pub fn remove_node(&mut self, node: &Node) -> Option<DistanceTableEntry> {
        let distance = self.local_id.distance(&node.id);

        let bucket = self.buckets.get_mut(&distance)?;
        let removed = bucket.remove(&node.id);

        if bucket.is_empty() {
            self.buckets.remove(&distance);
        }

        removed
    }

    /// Mark a node as seen alive now. Returns `false` if the node is unknown.
    pub fn update_entry(&mut self, node_id: &NodeId) -> bool {
        let distance = self.local_id.distance(node_id);

        match self
            .buckets
            .get_mut(&distance)
            .and_then(|b| b.entries.iter_mut().find(|e| &e.node.id == node_id))
        {
            Some(entry) => {
                entry.refresh();
                true
            }
            None => false,
        }
    }

    /// All known nodes, ordered by ascending distance to `target`,
    /// with higher scores first among equally distant nodes.
    pub fn get_closest_nodes(&self, target: &NodeId) -> Vec<Node> {
        let mut entries: Vec<&DistanceTableEntry> =
            self.buckets.values().flat_map(|b| b.entries.iter()).collect();

        entries.sort_by_key(|e| (target.distance(&e.node.id), Reverse(e.score)));

        entries.into_iter().map(|e| e.node).collect()
    }

    pub fn get_all_nodes(&self) -> Vec<Node> {
        self.buckets
            .values()
            .flat_map(|b| b.entries.iter().map(|e| e.node))
            .collect()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        let distance = self.local_id.distance(node_id);

        self.buckets
            .get(&distance)
            .map(|b| b.entries.iter().any(|e| &e.node.id == node_id))
            .unwrap_or(false)
    }

    /// Return the number of nodes in this table.
    pub fn size(&self) -> usize {
        self.buckets.values().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use super::*;
    use crate::common::ID_SIZE;

    fn address(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    /// A node at distance 256 from the zero id.
    fn far_node(port: u16) -> Node {
        let mut id = NodeId::random();
        id.0[0] |= 0b1000_0000;

        Node::new(id, address(port))
    }

    fn table(bucket_size: usize) -> NodeDistanceTable {
        NodeDistanceTable::new(bucket_size, NodeId([0; ID_SIZE]))
    }

    #[test]
    fn add_and_remove() {
        let mut table = table(KADEMLIA_BUCKET_SIZE);
        let node = far_node(1);

        let result = table.add_node(&node);

        assert!(result.success);
        assert_eq!(result.affected_entry.node(), &node);
        assert_eq!(result.affected_entry.distance(), 256);
        assert!(table.contains(&node.id));
        assert_eq!(table.size(), 1);

        assert!(table.remove_node(&node).is_some());
        assert!(!table.contains(&node.id));
        assert!(table.is_empty());
    }

    #[test]
    fn add_existing_updates_address() {
        let mut table = table(KADEMLIA_BUCKET_SIZE);
        let node = far_node(1);

        table.add_node(&node);
        let result = table.add_node(&Node::new(node.id, address(2)));

        assert!(result.success);
        assert_eq!(table.size(), 1);
        assert_eq!(table.get_all_nodes()[0].address, address(2));
    }

    #[test]
    fn full_bucket_returns_least_recently_seen() {
        let mut table = table(2);

        let first = far_node(1);
        let second = far_node(2);
        table.add_node(&first);
        table.add_node(&second);

        assert!(table.bucket(256).unwrap().is_full());

        std::thread::sleep(std::time::Duration::from_millis(2));
        table.update_entry(&first.id);

        let third = far_node(3);
        let result = table.add_node(&third);

        assert!(!result.success);
        assert_eq!(result.affected_entry.node(), &second);
        assert!(!table.contains(&third.id));
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn other_buckets_are_unaffected() {
        let mut table = table(1);

        table.add_node(&far_node(1));

        let mut id = [0; ID_SIZE];
        id[1] = 1;
        let near = Node::new(NodeId(id), address(2));

        assert!(table.add_node(&near).success);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn update_unknown_entry() {
        let mut table = table(KADEMLIA_BUCKET_SIZE);

        assert!(!table.update_entry(&NodeId::random()));
    }

    #[test]
    fn closest_nodes_order() {
        let mut table = table(KADEMLIA_BUCKET_SIZE);

        let a = far_node(1);
        let b = far_node(2);

        let mut near_id = [0; ID_SIZE];
        near_id[ID_SIZE - 1] = 1;
        let near = Node::new(NodeId(near_id), address(3));

        table.add_node(&a);
        table.add_node(&b);
        table.add_node(&near);

        table.update_entry(&b.id);

        let closest = table.get_closest_nodes(&NodeId([0; ID_SIZE]));

        assert_eq!(closest, vec![near, b, a]);
    }
}
