//! Shared fixtures for filesystem tests
#![allow(dead_code)]

use std::sync::Arc;

use client::chat::ChatClient;
use client::models::ChannelType;
use client::testkit::{channel, MockChatClient};
use mmfs::fs::TreeBuilder;

/// A server with two teams and one channel of every kind.
///
/// engineering: "Town Square" (public), "Secret Plans" (private), a group
/// with alice and bob, a DM with alice and a DM with a deleted user.
/// marketing: "Launch" (public).
pub fn sample_server() -> Arc<MockChatClient> {
    let mock = Arc::new(MockChatClient::new("me"));
    mock.add_user("u-alice", "alice");
    mock.add_user("u-bob", "bob");

    mock.add_team("t-eng", "engineering");
    mock.add_channel(
        "t-eng",
        channel("c-town", ChannelType::Public, "town-square", "Town Square"),
    );
    mock.add_channel(
        "t-eng",
        channel("c-secret", ChannelType::Private, "secret-plans", "Secret Plans"),
    );
    mock.add_channel(
        "t-eng",
        channel("c-group", ChannelType::Group, "0f3a9c", "alice, bob, me"),
    );
    mock.set_members("c-group", &["me-id", "u-bob", "u-alice"]);
    mock.add_channel(
        "t-eng",
        channel("c-dm", ChannelType::Direct, "me-id__u-alice", ""),
    );
    mock.add_channel(
        "t-eng",
        channel("c-ghost", ChannelType::Direct, "u-ghost__me-id", ""),
    );

    mock.add_team("t-mkt", "marketing");
    mock.add_channel(
        "t-mkt",
        channel("c-launch", ChannelType::Public, "launch", "Launch"),
    );

    mock
}

pub fn builder(mock: &Arc<MockChatClient>) -> TreeBuilder {
    let client: Arc<dyn ChatClient> = mock.clone();
    TreeBuilder::new(client)
}
