use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::{Certificate, Client, StatusCode};
use url::Url;

use crate::api::{
    ApiRequest, CreatePost, GetChannelsForTeamForUser, GetPostsAroundLastUnread, GetTeamsForUser,
    GetUser, GetUsersInChannel, Login, ViewChannel,
};
use crate::chat::ChatClient;
use crate::error::ApiError;
use crate::models::{Channel, Fetched, Post, PostList, Team, User};

/// Header carrying the session token on a successful login
const TOKEN_HEADER: &str = "Token";

/// Upper bound on members fetched when naming a group channel
const MEMBERS_PAGE_SIZE: u32 = 100;

/// Connection settings for a Mattermost server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `https://chat.example.com`
    pub server: Url,
    /// Extra PEM trust roots, for servers behind a private CA
    pub ca_cert: Option<PathBuf>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(server: Url) -> Self {
        Self {
            server,
            ca_cert: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// The API v4 root under the server URL, always with a trailing slash
    pub fn api_base(&self) -> Result<Url, ApiError> {
        let mut base = self.server.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join("api/v4/")?)
    }

    fn http_client(&self) -> Result<Client, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(default_headers)
            .timeout(self.timeout);

        if let Some(path) = &self.ca_cert {
            let pem = std::fs::read(path)?;
            let certs = Certificate::from_pem_bundle(&pem)
                .map_err(|e| ApiError::Certificate(format!("{}: {}", path.display(), e)))?;
            if certs.is_empty() {
                return Err(ApiError::Certificate(format!(
                    "{}: no certificates found",
                    path.display()
                )));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(builder.build()?)
    }
}

/// An authenticated session against the Mattermost REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    remote: Url,
    client: Client,
    token: String,
    user: User,
}

impl ApiClient {
    /// Log in with username and password, keeping the session token
    pub async fn login(
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<Self, ApiError> {
        let remote = config.api_base()?;
        let client = config.http_client()?;

        tracing::debug!(server = %remote, username, "logging in");

        let request = Login {
            login_id: username.to_string(),
            password: password.to_string(),
        };
        let response = request.build_request(&remote, &client)?.send().await?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ));
        }

        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(ApiError::MissingToken)?;
        let user: User = response.json().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "logged in");

        Ok(Self {
            remote,
            client,
            token,
            user,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request
            .build_request(&self.remote, &self.client)?
            .bearer_auth(&self.token);
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T::Response>().await?)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    /// Issue a request with `If-None-Match`, mapping 304 to [`Fetched::NotModified`]
    pub async fn call_conditional<T: ApiRequest>(
        &self,
        request: T,
        etag: Option<&str>,
    ) -> Result<Fetched<T::Response>, ApiError> {
        let mut request_builder = request
            .build_request(&self.remote, &self.client)?
            .bearer_auth(&self.token);
        if let Some(etag) = etag {
            request_builder = request_builder.header(IF_NONE_MATCH, etag);
        }
        let response = request_builder.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(Fetched::NotModified);
        }
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let value = response.json::<T::Response>().await?;

        Ok(Fetched::Fresh { value, etag })
    }
}

#[async_trait]
impl ChatClient for ApiClient {
    fn user(&self) -> &User {
        &self.user
    }

    async fn list_teams_for_user(
        &self,
        user_id: &str,
        etag: Option<&str>,
    ) -> Result<Fetched<Vec<Team>>, ApiError> {
        tracing::debug!(user_id, etag, "listing teams");
        let request = GetTeamsForUser {
            user_id: user_id.to_string(),
        };
        self.call_conditional(request, etag).await
    }

    async fn list_channels_for_team(
        &self,
        team_id: &str,
        user_id: &str,
        etag: Option<&str>,
    ) -> Result<Fetched<Vec<Channel>>, ApiError> {
        tracing::debug!(team_id, user_id, etag, "listing channels");
        let request = GetChannelsForTeamForUser {
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
        };
        self.call_conditional(request, etag).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, ApiError> {
        self.call(GetUser {
            user_id: user_id.to_string(),
        })
        .await
    }

    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<User>, ApiError> {
        self.call(GetUsersInChannel {
            channel_id: channel_id.to_string(),
            page: 0,
            per_page: MEMBERS_PAGE_SIZE,
        })
        .await
    }

    async fn get_unread_window(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<PostList, ApiError> {
        tracing::debug!(user_id, channel_id, "fetching unread window");
        self.call(GetPostsAroundLastUnread::unread_window(user_id, channel_id))
            .await
    }

    async fn mark_channel_read(&self, user_id: &str, channel_id: &str) -> Result<(), ApiError> {
        tracing::debug!(user_id, channel_id, "marking channel read");
        self.call(ViewChannel::mark_read(user_id, channel_id))
            .await
            .map(|_| ())
    }

    async fn create_post(&self, channel_id: &str, message: &str) -> Result<Post, ApiError> {
        tracing::debug!(channel_id, bytes = message.len(), "creating post");
        self.call(CreatePost {
            channel_id: channel_id.to_string(),
            message: message.to_string(),
        })
        .await
    }
}
