use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;

use super::{endpoint, ApiRequest};
use crate::error::ApiError;
use crate::models::{Post, PostList};

/// Size of the window fetched after the last-read marker
pub const UNREAD_WINDOW: u32 = 200;

#[derive(Debug, Clone)]
pub struct GetPostsAroundLastUnread {
    pub user_id: String,
    pub channel_id: String,
    pub limit_before: u32,
    pub limit_after: u32,
}

impl GetPostsAroundLastUnread {
    pub fn unread_window(user_id: &str, channel_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            limit_before: 0,
            limit_after: UNREAD_WINDOW,
        }
    }
}

impl ApiRequest for GetPostsAroundLastUnread {
    type Response = PostList;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let path = format!(
            "users/{}/channels/{}/posts/unread",
            self.user_id, self.channel_id
        );
        Ok(client.get(endpoint(base_url, &path)?).query(&[
            ("limit_before", self.limit_before),
            ("limit_after", self.limit_after),
        ]))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePost {
    pub channel_id: String,
    pub message: String,
}

impl ApiRequest for CreatePost {
    type Response = Post;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(endpoint(base_url, "posts")?).json(&self))
    }
}
