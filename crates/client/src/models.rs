//! Mattermost resources as returned by the v4 REST API.
//!
//! Only the fields the filesystem reads are modelled; everything else in
//! the JSON payloads is ignored on deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Result of a conditional (`If-None-Match`) fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// The remote confirmed the entity tag we sent is still current
    NotModified,
    /// A full payload, with the entity tag the remote attached to it (if any)
    Fresh { value: T, etag: Option<String> },
}

impl<T> Fetched<T> {
    pub fn fresh(value: T, etag: impl Into<Option<String>>) -> Self {
        Fetched::Fresh {
            value,
            etag: etag.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    /// URL-safe team name, used as the directory name
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// The four kinds of conversation a channel record can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Public,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "G")]
    Group,
    #[serde(rename = "D")]
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    /// Internal name. For direct messages this is `<user_id>__<user_id>`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    pub user_id: String,
    /// Milliseconds since the unix epoch
    pub create_at: i64,
    /// Id of the thread root when this post is a reply, empty otherwise
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
}

impl Post {
    /// The id readers should use to refer to this post's thread
    pub fn thread_id(&self) -> &str {
        if self.root_id.is_empty() {
            &self.id
        } else {
            &self.root_id
        }
    }
}

/// A window of posts; `order` lists ids newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostList {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub posts: HashMap<String, Post>,
}

impl PostList {
    /// Posts in chronological order, skipping ids the payload did not include
    pub fn oldest_first(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().rev().filter_map(|id| {
            let post = self.posts.get(id);
            if post.is_none() {
                tracing::warn!(post_id = %id, "post listed in order but missing from payload");
            }
            post
        })
    }
}
