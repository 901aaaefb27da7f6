//! Inode assignment and lookup for the filesystem tree
//!
//! FUSE identifies nodes by inode (u64). Every node's inode is derived from
//! its parent's inode and its own name, so the same (parent, name) pair
//! always lands on the same number. The table indexes a built tree by
//! inode so kernel requests can be routed back to their node.

use std::collections::HashMap;

use super::tree::Node;

/// Inode of the filesystem root
pub const ROOT_INODE: u64 = 1;

/// Derive the inode of `name` under `parent`.
///
/// A hash of the pair, so collisions between unrelated pairs are possible
/// but vanishingly rare. Never returns 0 or the root inode.
pub fn allocate(parent: u64, name: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&parent.to_le_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);

    match u64::from_le_bytes(bytes) {
        ino if ino <= ROOT_INODE => ino + 2,
        ino => ino,
    }
}

/// Mapping from inode to node for one tree snapshot
#[derive(Default)]
pub struct InodeTable {
    nodes: HashMap<u64, Node>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its inode.
    ///
    /// On a collision the first node keeps the inode.
    pub fn insert(&mut self, node: Node) {
        let ino = node.inode();
        if let Some(existing) = self.nodes.get(&ino) {
            tracing::warn!(
                inode = ino,
                kept = existing.name(),
                dropped = node.name(),
                "inode collision"
            );
            return;
        }
        self.nodes.insert(ino, node);
    }

    pub fn get(&self, ino: u64) -> Option<&Node> {
        self.nodes.get(&ino)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_allocate_is_deterministic() {
        assert_eq!(allocate(ROOT_INODE, "engineering"), allocate(ROOT_INODE, "engineering"));
        let team = allocate(ROOT_INODE, "engineering");
        assert_eq!(allocate(team, "town-square"), allocate(team, "town-square"));
    }

    #[test]
    fn test_allocate_depends_on_parent_and_name() {
        let a = allocate(ROOT_INODE, "unread");
        let b = allocate(ROOT_INODE, "in");
        let c = allocate(a, "unread");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_allocate_distinct_names_under_one_parent() {
        let inodes: HashSet<u64> = (0..10_000)
            .map(|i| allocate(42, &format!("channel-{}", i)))
            .collect();
        assert_eq!(inodes.len(), 10_000);
        assert!(!inodes.contains(&0));
        assert!(!inodes.contains(&ROOT_INODE));
    }
}
