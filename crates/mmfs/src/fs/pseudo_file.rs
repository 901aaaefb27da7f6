//! The two leaf files every channel carries
//!
//! Neither file holds content of its own. Reading `unread` fetches the
//! channel's unread window, renders it as text and then marks the channel
//! read. Writing to `in` posts the written bytes as one message.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone, Utc};
use client::chat::ChatClient;
use client::models::{Post, PostList, User};

use super::error::FsError;
use super::tree::{NodeAttr, NodeKind};

pub const UNREAD_FILE: &str = "unread";
pub const IN_FILE: &str = "in";

/// Read-only for owner, group and other
pub const UNREAD_PERM: u16 = 0o444;
/// Write-only for owner, group and other
pub const IN_PERM: u16 = 0o222;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SHORT_ID_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadFile {
    channel_id: String,
    inode: u64,
}

impl UnreadFile {
    pub fn new(channel_id: &str, inode: u64) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            inode,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr {
            inode: self.inode,
            kind: NodeKind::File,
            perm: UNREAD_PERM,
        }
    }

    /// Fetch, render and then mark the channel read.
    ///
    /// The channel is only marked read once every line rendered; any
    /// earlier failure leaves the remote read marker where it was.
    pub async fn read(&self, client: &dyn ChatClient) -> Result<Vec<u8>, FsError> {
        let me = client.user().id.clone();
        let window = client.get_unread_window(&me, &self.channel_id).await?;

        let text = render_window(client, &window, &Local).await?;

        client.mark_channel_read(&me, &self.channel_id).await?;
        tracing::debug!(
            channel_id = %self.channel_id,
            posts = window.order.len(),
            bytes = text.len(),
            "read unread window"
        );
        Ok(text.into_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFile {
    channel_id: String,
    inode: u64,
}

impl InFile {
    pub fn new(channel_id: &str, inode: u64) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            inode,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr {
            inode: self.inode,
            kind: NodeKind::File,
            perm: IN_PERM,
        }
    }

    /// Post `data` as one message and report all of it written
    pub async fn write(&self, client: &dyn ChatClient, data: &[u8]) -> Result<usize, FsError> {
        let message = std::str::from_utf8(data).map_err(|_| FsError::InvalidUtf8)?;
        let post = client.create_post(&self.channel_id, message).await?;
        tracing::debug!(channel_id = %self.channel_id, post_id = %post.id, bytes = data.len(), "posted message");
        Ok(data.len())
    }
}

/// Leaf nodes: attr plus read or write, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoFile {
    Unread(UnreadFile),
    In(InFile),
}

impl PseudoFile {
    pub fn attr(&self) -> NodeAttr {
        match self {
            PseudoFile::Unread(file) => file.attr(),
            PseudoFile::In(file) => file.attr(),
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            PseudoFile::Unread(file) => file.channel_id(),
            PseudoFile::In(file) => file.channel_id(),
        }
    }
}

/// Render a window oldest first, looking each author up once
pub async fn render_window<Tz>(
    client: &dyn ChatClient,
    window: &PostList,
    tz: &Tz,
) -> Result<String, FsError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut authors: HashMap<String, User> = HashMap::new();
    let mut text = String::new();

    for post in window.oldest_first() {
        if !authors.contains_key(&post.user_id) {
            let author = client.get_user(&post.user_id).await?;
            authors.insert(post.user_id.clone(), author);
        }
        let username = authors
            .get(&post.user_id)
            .map(|user| user.username.as_str())
            .unwrap_or_default();
        text.push_str(&format_line(post, username, tz));
    }

    Ok(text)
}

/// One rendered line, newline included
pub fn format_line<Tz>(post: &Post, username: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} <{}> {}: {}\n",
        human_time(post.create_at, tz),
        short_id(post.thread_id()),
        username,
        post.message
    )
}

fn human_time<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let utc = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    utc.with_timezone(tz).format(TIME_FORMAT).to_string()
}

/// The last few characters of an id, or all of it when it is short
fn short_id(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(SHORT_ID_LEN - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &id[start..]
}
