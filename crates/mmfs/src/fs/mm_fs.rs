//! FUSE adapter for the chat filesystem
//!
//! Implements the fuser::Filesystem trait on top of a resolved [`Tree`].
//! Every operation is answered from the tree snapshot except reads of
//! `unread` and writes to `in`, which go to the remote from tasks spawned
//! on the tokio runtime. The reply travels with the task.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use client::chat::ChatClient;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use super::error::FsError;
use super::pseudo_file::{InFile, PseudoFile, UnreadFile};
use super::tree::{NodeAttr, NodeKind, Tree};

/// Filesystem name and subtype reported to the kernel
pub const FS_NAME: &str = "mattermostfs";

/// Mount options for a chat filesystem.
///
/// Permission checks are left to the kernel against the mode bits, so the
/// read-only and write-only files are enforced before requests reach us.
pub fn mount_options(allow_other: bool) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(FS_NAME.to_string()),
        MountOption::Subtype(FS_NAME.to_string()),
        MountOption::DefaultPermissions,
    ];
    if allow_other {
        options.push(MountOption::AllowOther);
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// Bytes of an `unread` handle, filled by the first successful read
type Contents = Arc<OnceCell<Arc<Vec<u8>>>>;

/// State behind an open file handle
#[derive(Clone)]
enum OpenFile {
    /// Rendered on first read, then served from memory until release
    Unread { file: UnreadFile, contents: Contents },
    In(InFile),
}

/// FUSE filesystem over one tree snapshot
pub struct MmFs {
    /// Tokio runtime handle for remote calls
    rt: Handle,
    client: Arc<dyn ChatClient>,
    tree: Tree,
    /// File handle → open file. Never held across an await.
    handles: Mutex<HashMap<u64, OpenFile>>,
    next_fh: AtomicU64,
    mounted_at: SystemTime,
    uid: u32,
    gid: u32,
}

impl MmFs {
    /// Attributes never change within a snapshot
    const ATTR_TTL: Duration = Duration::from_secs(60);

    const BLOCK_SIZE: u32 = 512;

    pub fn new(rt: Handle, client: Arc<dyn ChatClient>, tree: Tree) -> Self {
        Self {
            rt,
            client,
            tree,
            handles: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
            mounted_at: SystemTime::now(),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn next_handle(&self) -> u64 {
        self.next_fh.fetch_add(1, Ordering::Relaxed)
    }

    fn make_attr(&self, attr: NodeAttr) -> FileAttr {
        let (kind, nlink) = match attr.kind {
            NodeKind::Directory => (FileType::Directory, 2),
            NodeKind::File => (FileType::RegularFile, 1),
        };

        FileAttr {
            ino: attr.inode,
            size: 0,
            blocks: 0,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind,
            perm: attr.perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: Self::BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Attributes of `name` inside the directory `parent`
    pub fn lookup_entry(&self, parent: u64, name: &str) -> Result<FileAttr, FsError> {
        let node = self.tree.dir(parent)?.lookup(name)?;
        Ok(self.make_attr(node.attr()))
    }

    pub fn attr(&self, ino: u64) -> Result<FileAttr, FsError> {
        let node = self
            .tree
            .node(ino)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", ino)))?;
        Ok(self.make_attr(node.attr()))
    }

    /// Directory listing including `.` and `..`, sorted by name after those
    pub fn list_dir(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>, FsError> {
        let dir = self.tree.dir(ino)?;

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (dir.parent(), FileType::Directory, "..".to_string()),
        ];
        entries.extend(dir.list_children().into_iter().map(|entry| {
            let kind = match entry.kind {
                NodeKind::Directory => FileType::Directory,
                NodeKind::File => FileType::RegularFile,
            };
            (entry.inode, kind, entry.name)
        }));
        Ok(entries)
    }

    pub fn open_file(&self, ino: u64) -> Result<u64, FsError> {
        let open = match self.tree.file(ino)? {
            PseudoFile::Unread(file) => OpenFile::Unread {
                file: file.clone(),
                contents: Arc::new(OnceCell::new()),
            },
            PseudoFile::In(file) => OpenFile::In(file.clone()),
        };
        let fh = self.next_handle();
        self.handles.lock().insert(fh, open);
        Ok(fh)
    }

    fn handle(&self, fh: u64) -> Option<OpenFile> {
        self.handles.lock().get(&fh).cloned()
    }

    /// Up to `size` bytes of an unread handle starting at `offset`.
    ///
    /// The first read of a handle performs the remote read (which marks
    /// the channel read); later reads slice the same bytes. Concurrent
    /// reads of one handle wait on the same fetch. The returned future
    /// owns everything it needs, so it can run on the runtime while the
    /// session loop moves on.
    pub fn read_handle(
        &self,
        fh: u64,
        offset: i64,
        size: u32,
    ) -> impl Future<Output = Result<Vec<u8>, FsError>> + Send + 'static {
        let open = self.handle(fh);
        let client = self.client.clone();

        async move {
            let (file, contents) = match open {
                Some(OpenFile::Unread { file, contents }) => (file, contents),
                _ => return Err(FsError::BadHandle(fh)),
            };

            let bytes = contents
                .get_or_try_init(|| async {
                    file.read(client.as_ref()).await.map(Arc::new)
                })
                .await?;

            Ok(slice(bytes, offset, size).to_vec())
        }
    }

    /// Post `data` through an `in` handle; resolves to the bytes accepted
    pub fn write_handle(
        &self,
        fh: u64,
        data: &[u8],
    ) -> impl Future<Output = Result<usize, FsError>> + Send + 'static {
        let open = self.handle(fh);
        let client = self.client.clone();
        let data = data.to_vec();

        async move {
            let file = match open {
                Some(OpenFile::In(file)) => file,
                _ => return Err(FsError::BadHandle(fh)),
            };
            file.write(client.as_ref(), &data).await
        }
    }

    pub fn release_handle(&self, fh: u64) {
        self.handles.lock().remove(&fh);
    }

    /// Number of currently open file handles
    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }
}

/// The part of `data` covered by a read of `size` bytes at `offset`
fn slice(data: &[u8], offset: i64, size: u32) -> &[u8] {
    let start = usize::try_from(offset).unwrap_or(0).min(data.len());
    let end = start.saturating_add(size as usize).min(data.len());
    &data[start..end]
}

fn log_failure(op: &str, ino: u64, err: &FsError) {
    match err {
        FsError::NotFound(_) => tracing::debug!(op, ino, error = %err, "request failed"),
        FsError::Remote(_) | FsError::Cache(_) => {
            tracing::error!(op, ino, error = %err, "remote request failed")
        }
        _ => tracing::warn!(op, ino, error = %err, "request failed"),
    }
}

impl Filesystem for MmFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        tracing::info!(
            user = %self.client.user().username,
            nodes = self.tree.len(),
            "FUSE filesystem initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(open_handles = self.handles.lock().len(), "FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        // no node is named with invalid UTF-8
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.lookup_entry(parent, name) {
            Ok(attr) => reply.entry(&Self::ATTR_TTL, &attr, 0),
            Err(e) => {
                log_failure("lookup", parent, &e);
                reply.error(e.errno());
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.attr(ino) {
            Ok(attr) => reply.attr(&Self::ATTR_TTL, &attr),
            Err(e) => {
                log_failure("getattr", ino, &e);
                reply.error(e.errno());
            }
        }
    }

    // Shell redirection truncates on open; there is nothing to truncate, so
    // attribute changes are accepted and ignored.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.attr(ino) {
            Ok(attr) => reply.attr(&Self::ATTR_TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.list_dir(ino) {
            Ok(entries) => entries,
            Err(e) => {
                log_failure("readdir", ino, &e);
                reply.error(e.errno());
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }

        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.open_file(ino) {
            Ok(fh) => {
                tracing::debug!(ino, fh, "open");
                reply.opened(
                    fh,
                    fuser::consts::FOPEN_DIRECT_IO | fuser::consts::FOPEN_NONSEEKABLE,
                )
            }
            Err(e) => {
                log_failure("open", ino, &e);
                reply.error(e.errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        // remote reads run on the runtime so other requests keep flowing
        let read = self.read_handle(fh, offset, size);
        self.rt.spawn(async move {
            match read.await {
                Ok(data) => {
                    tracing::debug!(ino, fh, offset, len = data.len(), "read");
                    reply.data(&data)
                }
                Err(e) => {
                    log_failure("read", ino, &e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let write = self.write_handle(fh, data);
        self.rt.spawn(async move {
            match write.await {
                Ok(written) => {
                    tracing::debug!(ino, fh, len = written, "write");
                    reply.written(written as u32)
                }
                Err(e) => {
                    log_failure("write", ino, &e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        // writes are sent as they arrive
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.release_handle(fh);
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use client::models::ChannelType;
    use client::testkit::{channel, post, MockChatClient, MockOp};
    use tokio::runtime::Runtime;

    use super::*;
    use crate::fs::inode_table::ROOT_INODE;
    use crate::fs::tree::TreeBuilder;

    fn setup() -> (Runtime, Arc<MockChatClient>, MmFs) {
        let rt = Runtime::new().unwrap();
        let mock = Arc::new(MockChatClient::new("me"));
        mock.add_user("u-alice", "alice");
        mock.add_team("t1", "engineering");
        mock.add_channel(
            "t1",
            channel("c1", ChannelType::Public, "town-square", "Town Square"),
        );
        mock.set_unread(
            "c1",
            vec![
                post("p00002", "u-alice", 1_000, "world"),
                post("p00001", "u-alice", 0, "hello"),
            ],
        );

        let client: Arc<dyn ChatClient> = mock.clone();
        let tree = rt
            .block_on(TreeBuilder::new(client.clone()).resolve())
            .unwrap();
        let fs = MmFs::new(rt.handle().clone(), client, tree);
        (rt, mock, fs)
    }

    fn channel_ino(fs: &MmFs) -> u64 {
        let team = fs.lookup_entry(ROOT_INODE, "engineering").unwrap();
        fs.lookup_entry(team.ino, "Town Square").unwrap().ino
    }

    #[test]
    fn test_mount_options() {
        let options = mount_options(false);
        assert!(options.contains(&MountOption::FSName("mattermostfs".into())));
        assert!(options.contains(&MountOption::DefaultPermissions));
        assert!(!options.contains(&MountOption::AllowOther));

        let options = mount_options(true);
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::AutoUnmount));
    }

    #[test]
    fn test_slice() {
        let data = b"0123456789";
        assert_eq!(slice(data, 0, 4), b"0123");
        assert_eq!(slice(data, 8, 4), b"89");
        assert_eq!(slice(data, 10, 4), b"");
        assert_eq!(slice(data, 42, 4), b"");
        assert_eq!(slice(data, -1, 4), b"0123");
    }

    #[test]
    fn test_lookup_and_attrs() {
        let (_rt, _mock, fs) = setup();

        let root = fs.attr(ROOT_INODE).unwrap();
        assert_eq!(root.kind, FileType::Directory);
        assert_eq!(root.perm, 0o555);

        let ch = channel_ino(&fs);
        let unread = fs.lookup_entry(ch, "unread").unwrap();
        let input = fs.lookup_entry(ch, "in").unwrap();
        assert_eq!(unread.kind, FileType::RegularFile);
        assert_eq!(unread.perm, 0o444);
        assert_eq!(input.perm, 0o222);
        assert_eq!(unread.size, 0);

        let missing = fs.lookup_entry(ch, "outbox").unwrap_err();
        assert_eq!(missing.errno(), libc::ENOENT);
        let under_file = fs.lookup_entry(unread.ino, "x").unwrap_err();
        assert_eq!(under_file.errno(), libc::ENOTDIR);
        assert_eq!(fs.attr(12345).unwrap_err().errno(), libc::ENOENT);
    }

    #[test]
    fn test_list_dir() {
        let (_rt, _mock, fs) = setup();

        let root: Vec<String> = fs
            .list_dir(ROOT_INODE)
            .unwrap()
            .into_iter()
            .map(|(_, _, name)| name)
            .collect();
        assert_eq!(root, vec![".", "..", "engineering"]);

        let team = fs.lookup_entry(ROOT_INODE, "engineering").unwrap().ino;
        let ch = channel_ino(&fs);
        let entries = fs.list_dir(ch).unwrap();
        assert_eq!(entries[0], (ch, FileType::Directory, ".".to_string()));
        assert_eq!(entries[1], (team, FileType::Directory, "..".to_string()));
        let names: Vec<&str> = entries[2..].iter().map(|(_, _, n)| n.as_str()).collect();
        assert_eq!(names, vec!["unread", "in"]);

        let unread = fs.lookup_entry(ch, "unread").unwrap().ino;
        assert_eq!(fs.list_dir(unread).unwrap_err().errno(), libc::ENOTDIR);
    }

    #[test]
    fn test_read_fetches_once_per_handle() {
        let (rt, mock, fs) = setup();
        let unread = fs.lookup_entry(channel_ino(&fs), "unread").unwrap().ino;

        let fh = fs.open_file(unread).unwrap();
        let first = rt.block_on(fs.read_handle(fh, 0, 4096)).unwrap();
        let text = String::from_utf8(first.clone()).unwrap();
        assert!(text.contains("<p00001> alice: hello\n"));
        assert!(text.ends_with("<p00002> alice: world\n"));

        // the kernel keeps reading until it gets nothing back
        let rest = rt.block_on(fs.read_handle(fh, first.len() as i64, 4096));
        assert!(rest.unwrap().is_empty());
        let head = rt.block_on(fs.read_handle(fh, 0, 5)).unwrap();
        assert_eq!(head, first[..5].to_vec());
        assert_eq!(mock.calls(MockOp::GetUnreadWindow), 1);
        assert_eq!(mock.marked_read(), vec!["c1".to_string()]);

        fs.release_handle(fh);
        assert_eq!(fs.open_handles(), 0);

        // a fresh open reads again; everything was marked read
        let fh = fs.open_file(unread).unwrap();
        assert!(rt.block_on(fs.read_handle(fh, 0, 4096)).unwrap().is_empty());
        assert_eq!(mock.calls(MockOp::GetUnreadWindow), 2);
    }

    #[test]
    fn test_failed_read_can_be_retried() {
        let (rt, mock, fs) = setup();
        let unread = fs.lookup_entry(channel_ino(&fs), "unread").unwrap().ino;
        let fh = fs.open_file(unread).unwrap();

        mock.fail(MockOp::GetUnreadWindow);
        let err = rt.block_on(fs.read_handle(fh, 0, 4096)).unwrap_err();
        assert_eq!(err.errno(), libc::EIO);
        assert!(mock.marked_read().is_empty());

        mock.recover(MockOp::GetUnreadWindow);
        assert!(!rt.block_on(fs.read_handle(fh, 0, 4096)).unwrap().is_empty());
    }

    #[test]
    fn test_write_posts() {
        let (rt, mock, fs) = setup();
        let input = fs.lookup_entry(channel_ino(&fs), "in").unwrap().ino;
        let fh = fs.open_file(input).unwrap();

        assert_eq!(rt.block_on(fs.write_handle(fh, b"deploy done\n")).unwrap(), 12);
        assert_eq!(
            mock.created_posts(),
            vec![("c1".to_string(), "deploy done\n".to_string())]
        );
        assert_eq!(
            rt.block_on(fs.write_handle(fh, &[0xc3, 0x28])).unwrap_err().errno(),
            libc::EINVAL
        );
        assert_eq!(mock.created_posts().len(), 1);
    }

    #[test]
    fn test_handle_kinds_are_enforced() {
        let (rt, mock, fs) = setup();
        let ch = channel_ino(&fs);
        let unread = fs.lookup_entry(ch, "unread").unwrap().ino;
        let input = fs.lookup_entry(ch, "in").unwrap().ino;

        let read_fh = fs.open_file(unread).unwrap();
        let write_fh = fs.open_file(input).unwrap();
        assert_ne!(read_fh, write_fh);

        let err = rt.block_on(fs.write_handle(read_fh, b"x")).unwrap_err();
        assert_eq!(err.errno(), libc::EBADF);
        let err = rt.block_on(fs.read_handle(write_fh, 0, 10)).unwrap_err();
        assert_eq!(err.errno(), libc::EBADF);
        let err = rt.block_on(fs.read_handle(999, 0, 10)).unwrap_err();
        assert_eq!(err.errno(), libc::EBADF);
        assert_eq!(fs.open_file(ch).unwrap_err().errno(), libc::EISDIR);
        assert!(mock.created_posts().is_empty());
        assert_eq!(mock.calls(MockOp::GetUnreadWindow), 0);
    }
}
