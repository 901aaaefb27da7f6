use reqwest::{Client, RequestBuilder, Url};
use serde::de::IgnoredAny;
use serde::Serialize;

use super::{endpoint, ApiRequest};
use crate::error::ApiError;
use crate::models::Channel;

#[derive(Debug, Clone)]
pub struct GetChannelsForTeamForUser {
    pub user_id: String,
    pub team_id: String,
}

impl ApiRequest for GetChannelsForTeamForUser {
    type Response = Vec<Channel>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let path = format!("users/{}/teams/{}/channels", self.user_id, self.team_id);
        Ok(client
            .get(endpoint(base_url, &path)?)
            .query(&[("include_deleted", "false")]))
    }
}

/// Record a channel view for a user.
///
/// Switching away from `prev_channel_id` is what advances its last-viewed
/// marker, so marking a channel read sends it as the previous channel with
/// no current one.
#[derive(Debug, Clone, Serialize)]
pub struct ViewChannel {
    #[serde(skip)]
    pub user_id: String,
    pub channel_id: String,
    pub prev_channel_id: String,
}

impl ViewChannel {
    pub fn mark_read(user_id: &str, channel_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel_id: String::new(),
            prev_channel_id: channel_id.to_string(),
        }
    }
}

impl ApiRequest for ViewChannel {
    type Response = IgnoredAny;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let path = format!("channels/members/{}/view", self.user_id);
        Ok(client.post(endpoint(base_url, &path)?).json(&self))
    }
}
