use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::chat::ChatClient;
use crate::error::ApiError;
use crate::models::{Channel, ChannelType, Fetched, Post, PostList, Team, User};

/// Operations of the chat interface, for failure injection and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListTeams,
    ListChannels,
    GetUser,
    ListChannelMembers,
    GetUnreadWindow,
    MarkChannelRead,
    CreatePost,
}

/// Build a channel record
pub fn channel(id: &str, kind: ChannelType, name: &str, display_name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        team_id: String::new(),
        kind,
        name: name.to_string(),
        display_name: display_name.to_string(),
    }
}

/// Build a top-level post
pub fn post(id: &str, user_id: &str, create_at: i64, message: &str) -> Post {
    Post {
        id: id.to_string(),
        channel_id: String::new(),
        user_id: user_id.to_string(),
        create_at,
        root_id: String::new(),
        message: message.to_string(),
    }
}

#[derive(Default)]
struct MockState {
    teams: Vec<Team>,
    teams_version: u64,
    channels: HashMap<String, Vec<Channel>>,
    channel_versions: HashMap<String, u64>,
    users: HashMap<String, User>,
    members: HashMap<String, Vec<String>>,
    unread: HashMap<String, PostList>,
    failing: HashSet<MockOp>,
    failing_users: HashSet<String>,
    log: Vec<(MockOp, String)>,
    created: Vec<(String, String)>,
}

impl MockState {
    fn record(&mut self, op: MockOp, key: &str) -> Result<(), ApiError> {
        self.log.push((op, key.to_string()));
        if self.failing.contains(&op) {
            return Err(injected());
        }
        Ok(())
    }
}

fn injected() -> ApiError {
    ApiError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR, "injected failure".into())
}

fn etag(scope: &str, version: u64) -> String {
    format!("\"{}-{}\"", scope, version)
}

pub struct MockChatClient {
    me: User,
    state: Mutex<MockState>,
}

impl MockChatClient {
    /// A client logged in as `username`, whose id is `<username>-id`
    pub fn new(username: &str) -> Self {
        let me = User {
            id: format!("{}-id", username),
            username: username.to_string(),
        };
        let mut state = MockState::default();
        state.users.insert(me.id.clone(), me.clone());
        Self {
            me,
            state: Mutex::new(state),
        }
    }

    pub fn add_user(&self, id: &str, username: &str) -> User {
        let user = User {
            id: id.to_string(),
            username: username.to_string(),
        };
        self.state.lock().users.insert(id.to_string(), user.clone());
        user
    }

    pub fn add_team(&self, id: &str, name: &str) -> Team {
        let team = Team {
            id: id.to_string(),
            name: name.to_string(),
            display_name: name.to_string(),
        };
        let mut state = self.state.lock();
        state.teams.push(team.clone());
        state.teams_version += 1;
        state.channels.entry(id.to_string()).or_default();
        team
    }

    /// Add a channel to a team, moving that team's channel entity tag
    pub fn add_channel(&self, team_id: &str, mut channel: Channel) -> Channel {
        channel.team_id = team_id.to_string();
        let mut state = self.state.lock();
        state
            .channels
            .entry(team_id.to_string())
            .or_default()
            .push(channel.clone());
        *state.channel_versions.entry(team_id.to_string()).or_default() += 1;
        channel
    }

    pub fn set_members(&self, channel_id: &str, user_ids: &[&str]) {
        self.state.lock().members.insert(
            channel_id.to_string(),
            user_ids.iter().map(|id| id.to_string()).collect(),
        );
    }

    /// Queue posts (newest first, as the service orders them) as a channel's unread window
    pub fn set_unread(&self, channel_id: &str, posts: Vec<Post>) {
        let list = PostList {
            order: posts.iter().map(|p| p.id.clone()).collect(),
            posts: posts.into_iter().map(|p| (p.id.clone(), p)).collect(),
        };
        self.state.lock().unread.insert(channel_id.to_string(), list);
    }

    pub fn fail(&self, op: MockOp) {
        self.state.lock().failing.insert(op);
    }

    pub fn recover(&self, op: MockOp) {
        self.state.lock().failing.remove(&op);
    }

    /// Make lookups of one user fail with a server error
    pub fn fail_user(&self, user_id: &str) {
        self.state.lock().failing_users.insert(user_id.to_string());
    }

    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().log.iter().filter(|(o, _)| *o == op).count()
    }

    /// Every call made so far, in order, with the id it was made for
    pub fn log(&self) -> Vec<(MockOp, String)> {
        self.state.lock().log.clone()
    }

    /// Channels marked read so far, in call order
    pub fn marked_read(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(op, _)| *op == MockOp::MarkChannelRead)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// `(channel_id, message)` for every post created so far
    pub fn created_posts(&self) -> Vec<(String, String)> {
        self.state.lock().created.clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    fn user(&self) -> &User {
        &self.me
    }

    async fn list_teams_for_user(
        &self,
        user_id: &str,
        etag_in: Option<&str>,
    ) -> Result<Fetched<Vec<Team>>, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::ListTeams, user_id)?;
        let current = etag("teams", state.teams_version);
        if etag_in == Some(current.as_str()) {
            return Ok(Fetched::NotModified);
        }
        Ok(Fetched::fresh(state.teams.clone(), current))
    }

    async fn list_channels_for_team(
        &self,
        team_id: &str,
        _user_id: &str,
        etag_in: Option<&str>,
    ) -> Result<Fetched<Vec<Channel>>, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::ListChannels, team_id)?;
        let channels = state.channels.get(team_id).cloned().ok_or_else(|| {
            ApiError::HttpStatus(StatusCode::NOT_FOUND, format!("team {}", team_id))
        })?;
        let version = state.channel_versions.get(team_id).copied().unwrap_or(0);
        let current = etag(&format!("channels-{}", team_id), version);
        if etag_in == Some(current.as_str()) {
            return Ok(Fetched::NotModified);
        }
        Ok(Fetched::fresh(channels, current))
    }

    async fn get_user(&self, user_id: &str) -> Result<User, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::GetUser, user_id)?;
        if state.failing_users.contains(user_id) {
            return Err(injected());
        }
        state.users.get(user_id).cloned().ok_or_else(|| {
            ApiError::HttpStatus(StatusCode::NOT_FOUND, format!("user {}", user_id))
        })
    }

    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<User>, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::ListChannelMembers, channel_id)?;
        let ids = state.members.get(channel_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn get_unread_window(
        &self,
        _user_id: &str,
        channel_id: &str,
    ) -> Result<PostList, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::GetUnreadWindow, channel_id)?;
        Ok(state.unread.get(channel_id).cloned().unwrap_or_default())
    }

    async fn mark_channel_read(&self, _user_id: &str, channel_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::MarkChannelRead, channel_id)?;
        state.unread.remove(channel_id);
        Ok(())
    }

    async fn create_post(&self, channel_id: &str, message: &str) -> Result<Post, ApiError> {
        let mut state = self.state.lock();
        state.record(MockOp::CreatePost, channel_id)?;
        let id = format!("post{:020}", state.created.len() + 1);
        state
            .created
            .push((channel_id.to_string(), message.to_string()));
        Ok(Post {
            id,
            channel_id: channel_id.to_string(),
            user_id: self.me.id.clone(),
            create_at: 0,
            root_id: String::new(),
            message: message.to_string(),
        })
    }
}
