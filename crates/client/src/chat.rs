use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{Channel, Fetched, Post, PostList, Team, User};

/// The remote chat operations the filesystem is built on.
///
/// Every call either yields its payload or an [`ApiError`]; a non-success
/// status from the remote is always an error. The list calls are
/// conditional: passing the entity tag of a previous response lets the
/// remote answer [`Fetched::NotModified`].
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// The authenticated user all per-user calls act on behalf of
    fn user(&self) -> &User;

    async fn list_teams_for_user(
        &self,
        user_id: &str,
        etag: Option<&str>,
    ) -> Result<Fetched<Vec<Team>>, ApiError>;

    async fn list_channels_for_team(
        &self,
        team_id: &str,
        user_id: &str,
        etag: Option<&str>,
    ) -> Result<Fetched<Vec<Channel>>, ApiError>;

    /// Fails with an error whose [`ApiError::is_not_found`] is true when
    /// the user does not exist
    async fn get_user(&self, user_id: &str) -> Result<User, ApiError>;

    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<User>, ApiError>;

    async fn get_unread_window(&self, user_id: &str, channel_id: &str)
        -> Result<PostList, ApiError>;

    async fn mark_channel_read(&self, user_id: &str, channel_id: &str) -> Result<(), ApiError>;

    async fn create_post(&self, channel_id: &str, message: &str) -> Result<Post, ApiError>;
}
