//! The team/channel hierarchy exposed by the filesystem
//!
//! ```text
//! /
//! ├── <team>/
//! │   ├── <channel>/
//! │   │   ├── unread   read: unread messages, marks the channel read
//! │   │   └── in       write: posts a message
//! │   └── [D]<user>/
//! │       ├── unread
//! │       └── in
//! └── <team>/
//! ```
//!
//! A [`Tree`] is a snapshot: teams and channels are listed once when it is
//! resolved and never change afterwards. Teams or channels created on the
//! server later only show up in a tree resolved after that (i.e. after a
//! remount). Lookups and listings are plain map reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use client::chat::ChatClient;
use client::models::Team as RemoteTeam;
use futures::future::try_join_all;

use super::cache::{CachedResource, CachedResources};
use super::error::FsError;
use super::inode_table::{allocate, InodeTable, ROOT_INODE};
use super::naming::{normalize_all, NormalizedChannel};
use super::pseudo_file::{InFile, PseudoFile, UnreadFile, IN_FILE, UNREAD_FILE};

/// Directory permissions: read and traverse for everyone
pub const DIR_PERM: u16 = 0o555;

/// Whether `name` can appear as a single path component
pub fn is_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\0'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub inode: u64,
    pub kind: NodeKind,
    pub perm: u16,
}

impl NodeAttr {
    fn dir(inode: u64) -> Self {
        Self {
            inode,
            kind: NodeKind::Directory,
            perm: DIR_PERM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u64,
    pub kind: NodeKind,
    pub name: String,
}

/// The filesystem root: one directory per team
#[derive(Debug)]
pub struct Root {
    teams: BTreeMap<String, Arc<Team>>,
}

impl Root {
    pub fn lookup(&self, name: &str) -> Result<Arc<Team>, FsError> {
        self.teams
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    pub fn list_children(&self) -> Vec<DirEntry> {
        self.teams
            .iter()
            .map(|(name, team)| DirEntry {
                inode: team.inode,
                kind: NodeKind::Directory,
                name: name.clone(),
            })
            .collect()
    }

    pub fn teams(&self) -> impl Iterator<Item = &Arc<Team>> {
        self.teams.values()
    }
}

/// A team directory: one directory per channel the user belongs to
#[derive(Debug)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub display_name: String,
    inode: u64,
    channels: BTreeMap<String, Arc<Channel>>,
}

impl Team {
    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Channel>, FsError> {
        self.channels
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    pub fn list_children(&self) -> Vec<DirEntry> {
        self.channels
            .iter()
            .map(|(name, channel)| DirEntry {
                inode: channel.inode,
                kind: NodeKind::Directory,
                name: name.clone(),
            })
            .collect()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.values()
    }
}

/// A channel directory holding exactly the `unread` and `in` files
#[derive(Debug)]
pub struct Channel {
    pub id: String,
    pub name: String,
    inode: u64,
    team_inode: u64,
    unread: UnreadFile,
    input: InFile,
}

impl Channel {
    fn new(channel: &NormalizedChannel, team_inode: u64) -> Self {
        let inode = allocate(team_inode, &channel.name);
        Self {
            id: channel.id.clone(),
            name: channel.name.clone(),
            inode,
            team_inode,
            unread: UnreadFile::new(&channel.id, allocate(inode, UNREAD_FILE)),
            input: InFile::new(&channel.id, allocate(inode, IN_FILE)),
        }
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn unread_file(&self) -> &UnreadFile {
        &self.unread
    }

    pub fn in_file(&self) -> &InFile {
        &self.input
    }

    /// Only the two fixed file names resolve; anything else is not found
    pub fn lookup(&self, name: &str) -> Result<PseudoFile, FsError> {
        match name {
            UNREAD_FILE => Ok(PseudoFile::Unread(self.unread.clone())),
            IN_FILE => Ok(PseudoFile::In(self.input.clone())),
            _ => Err(FsError::NotFound(name.to_string())),
        }
    }

    pub fn list_children(&self) -> Vec<DirEntry> {
        vec![
            DirEntry {
                inode: self.unread.inode(),
                kind: NodeKind::File,
                name: UNREAD_FILE.to_string(),
            },
            DirEntry {
                inode: self.input.inode(),
                kind: NodeKind::File,
                name: IN_FILE.to_string(),
            },
        ]
    }
}

/// Directory-like nodes: attr, lookup and readdir
#[derive(Debug, Clone)]
pub enum Dir {
    Root(Arc<Root>),
    Team(Arc<Team>),
    Channel(Arc<Channel>),
}

impl Dir {
    pub fn attr(&self) -> NodeAttr {
        match self {
            Dir::Root(_) => NodeAttr::dir(ROOT_INODE),
            Dir::Team(team) => NodeAttr::dir(team.inode),
            Dir::Channel(channel) => NodeAttr::dir(channel.inode),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Node, FsError> {
        match self {
            Dir::Root(root) => root.lookup(name).map(|t| Node::Dir(Dir::Team(t))),
            Dir::Team(team) => team.lookup(name).map(|c| Node::Dir(Dir::Channel(c))),
            Dir::Channel(channel) => channel.lookup(name).map(Node::File),
        }
    }

    /// Inode of the enclosing directory; the root is its own parent
    pub fn parent(&self) -> u64 {
        match self {
            Dir::Root(_) | Dir::Team(_) => ROOT_INODE,
            Dir::Channel(channel) => channel.team_inode,
        }
    }

    pub fn list_children(&self) -> Vec<DirEntry> {
        match self {
            Dir::Root(root) => root.list_children(),
            Dir::Team(team) => team.list_children(),
            Dir::Channel(channel) => channel.list_children(),
        }
    }
}

/// Any node of the tree, split by capability
#[derive(Debug, Clone)]
pub enum Node {
    Dir(Dir),
    File(PseudoFile),
}

impl Node {
    pub fn attr(&self) -> NodeAttr {
        match self {
            Node::Dir(dir) => dir.attr(),
            Node::File(file) => file.attr(),
        }
    }

    pub fn inode(&self) -> u64 {
        self.attr().inode
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Dir(Dir::Root(_)) => "/",
            Node::Dir(Dir::Team(team)) => &team.name,
            Node::Dir(Dir::Channel(channel)) => &channel.name,
            Node::File(PseudoFile::Unread(_)) => UNREAD_FILE,
            Node::File(PseudoFile::In(_)) => IN_FILE,
        }
    }
}

/// A resolved snapshot of the hierarchy, indexed by inode
pub struct Tree {
    root: Arc<Root>,
    inodes: InodeTable,
}

impl Tree {
    fn index(root: Arc<Root>) -> Self {
        let mut inodes = InodeTable::new();
        inodes.insert(Node::Dir(Dir::Root(root.clone())));
        for team in root.teams() {
            inodes.insert(Node::Dir(Dir::Team(team.clone())));
            for channel in team.channels() {
                inodes.insert(Node::Dir(Dir::Channel(channel.clone())));
                inodes.insert(Node::File(PseudoFile::Unread(channel.unread.clone())));
                inodes.insert(Node::File(PseudoFile::In(channel.input.clone())));
            }
        }
        Self { root, inodes }
    }

    pub fn root(&self) -> &Arc<Root> {
        &self.root
    }

    pub fn node(&self, ino: u64) -> Option<&Node> {
        self.inodes.get(ino)
    }

    pub fn dir(&self, ino: u64) -> Result<&Dir, FsError> {
        match self.node(ino) {
            Some(Node::Dir(dir)) => Ok(dir),
            Some(Node::File(_)) => Err(FsError::NotDirectory(ino)),
            None => Err(FsError::NotFound(format!("inode {}", ino))),
        }
    }

    pub fn file(&self, ino: u64) -> Result<&PseudoFile, FsError> {
        match self.node(ino) {
            Some(Node::File(file)) => Ok(file),
            Some(Node::Dir(_)) => Err(FsError::IsDirectory(ino)),
            None => Err(FsError::NotFound(format!("inode {}", ino))),
        }
    }

    /// Number of nodes in the snapshot
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }
}

/// Builds tree snapshots from the remote, revalidating listings by entity tag.
///
/// The builder outlives the trees it resolves. Its caches hold the team
/// listing and one normalized channel listing per team, so resolving again
/// only re-normalizes the teams whose channel listing actually changed.
pub struct TreeBuilder {
    client: Arc<dyn ChatClient>,
    teams: CachedResource<Vec<RemoteTeam>>,
    channels: CachedResources<String, Vec<NormalizedChannel>>,
}

impl TreeBuilder {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            teams: CachedResource::new(),
            channels: CachedResources::new(),
        }
    }

    /// Resolve a fresh snapshot of the whole hierarchy.
    ///
    /// Fails as a whole if any team or channel fails to resolve, so a tree
    /// never contains partially built nodes.
    pub async fn resolve(&self) -> Result<Tree, FsError> {
        let root = self.resolve_root().await?;
        let tree = Tree::index(Arc::new(root));
        tracing::info!(
            teams = tree.root.teams.len(),
            nodes = tree.len(),
            "resolved filesystem tree"
        );
        Ok(tree)
    }

    pub async fn resolve_root(&self) -> Result<Root, FsError> {
        let client = self.client.clone();
        let user_id = client.user().id.clone();

        let teams = self
            .teams
            .fetch(
                move |etag| async move {
                    client
                        .list_teams_for_user(&user_id, etag.as_deref())
                        .await
                        .map_err(FsError::from)
                },
                |teams| async move { Ok(teams) },
            )
            .await?;

        let resolved = try_join_all(teams.iter().map(|team| self.resolve_team(team))).await?;

        let mut by_name = BTreeMap::new();
        for team in resolved {
            if !is_entry_name(&team.name) {
                tracing::warn!(team = %team.name, team_id = %team.id, "team name is not a valid file name, skipping");
                continue;
            }
            if let Some(previous) = by_name.insert(team.name.clone(), Arc::new(team)) {
                tracing::warn!(team = %previous.name, team_id = %previous.id, "duplicate team name shadowed");
            }
        }

        Ok(Root { teams: by_name })
    }

    pub async fn resolve_team(&self, team: &RemoteTeam) -> Result<Team, FsError> {
        let inode = allocate(ROOT_INODE, &team.name);

        let client = self.client.clone();
        let user_id = client.user().id.clone();
        let team_id = team.id.clone();
        let normalizer = self.client.clone();

        let channels = self
            .channels
            .get(team.id.clone())
            .fetch(
                move |etag| async move {
                    client
                        .list_channels_for_team(&team_id, &user_id, etag.as_deref())
                        .await
                        .map_err(FsError::from)
                },
                move |channels| async move { normalize_all(normalizer.as_ref(), channels).await },
            )
            .await
            .inspect_err(|e| tracing::error!(team = %team.name, error = %e, "failed to resolve team"))?;

        let mut by_name = BTreeMap::new();
        for normalized in channels.iter() {
            if !is_entry_name(&normalized.name) {
                tracing::warn!(
                    team = %team.name,
                    channel = %normalized.name,
                    channel_id = %normalized.id,
                    "channel name is not a valid file name, skipping"
                );
                continue;
            }
            let channel = Channel::new(normalized, inode);
            if let Some(previous) = by_name.insert(channel.name.clone(), Arc::new(channel)) {
                tracing::warn!(
                    team = %team.name,
                    channel = %previous.name,
                    channel_id = %previous.id,
                    "duplicate channel name shadowed"
                );
            }
        }

        Ok(Team {
            id: team.id.clone(),
            name: team.name.clone(),
            display_name: team.display_name.clone(),
            inode,
            channels: by_name,
        })
    }
}
