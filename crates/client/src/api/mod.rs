use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub mod channels;
pub mod posts;
pub mod teams;
pub mod users;

pub use channels::{GetChannelsForTeamForUser, ViewChannel};
pub use posts::{CreatePost, GetPostsAroundLastUnread};
pub use teams::GetTeamsForUser;
pub use users::{GetUser, GetUsersInChannel, Login};

/// A single API v4 endpoint.
///
/// `base_url` is the API root (`<server>/api/v4/`), so implementations join
/// relative paths onto it.
pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}

/// Join a relative endpoint path onto the API root.
///
/// Fails when the base URL cannot carry a path (`mailto:` and the like).
pub(crate) fn endpoint(base_url: &Url, path: &str) -> Result<Url, ApiError> {
    Ok(base_url.join(path)?)
}
