use reqwest::{Client, RequestBuilder, Url};

use super::{endpoint, ApiRequest};
use crate::error::ApiError;
use crate::models::Team;

#[derive(Debug, Clone)]
pub struct GetTeamsForUser {
    pub user_id: String,
}

impl ApiRequest for GetTeamsForUser {
    type Response = Vec<Team>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let url = endpoint(base_url, &format!("users/{}/teams", self.user_id))?;
        Ok(client.get(url))
    }
}
