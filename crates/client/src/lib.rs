/**
 * Wire types for the Mattermost API v4 resources
 *  we expose through the filesystem.
 */
pub mod models;
/**
 * Typed request definitions, one per endpoint.
 */
pub mod api;
/**
 * The interface the filesystem consumes, and the
 *  REST client that implements it.
 */
pub mod chat;
pub mod client;
pub mod error;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub mod prelude {
    pub use crate::chat::ChatClient;
    pub use crate::client::{ApiClient, ClientConfig};
    pub use crate::error::ApiError;
    pub use crate::models::{Channel, ChannelType, Fetched, Post, PostList, Team, User};
}
