use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;

use super::{endpoint, ApiRequest};
use crate::error::ApiError;
use crate::models::User;

#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub login_id: String,
    pub password: String,
}

impl ApiRequest for Login {
    type Response = User;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(endpoint(base_url, "users/login")?).json(&self))
    }
}

#[derive(Debug, Clone)]
pub struct GetUser {
    pub user_id: String,
}

impl ApiRequest for GetUser {
    type Response = User;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let url = endpoint(base_url, &format!("users/{}", self.user_id))?;
        Ok(client.get(url))
    }
}

#[derive(Debug, Clone)]
pub struct GetUsersInChannel {
    pub channel_id: String,
    pub page: u32,
    pub per_page: u32,
}

impl ApiRequest for GetUsersInChannel {
    type Response = Vec<User>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.get(endpoint(base_url, "users")?).query(&[
            ("in_channel", self.channel_id),
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ]))
    }
}
