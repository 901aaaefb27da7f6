//! Filesystem-visible names for channels
//!
//! Public channels keep their display name. The other kinds get a marker
//! prefix, and group and direct-message channels are named after their
//! members since they have no meaningful display name of their own:
//!
//! - private: `[P]<display name>`
//! - group: `[G]<member usernames, excluding ours>`
//! - direct: `[D]<peer username>`

use client::chat::ChatClient;
use client::models::{Channel, ChannelType};

use super::error::FsError;

pub const PRIVATE_PREFIX: &str = "[P]";
pub const GROUP_PREFIX: &str = "[G]";
pub const DIRECT_PREFIX: &str = "[D]";

/// Placeholder used when a direct-message peer no longer exists
pub const MISSING_USER_PREFIX: &str = "Missing_User_";

/// Longest group name the remote will generate
const GROUP_NAME_MAX_CHARS: usize = 64;

/// A channel as it appears in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedChannel {
    pub id: String,
    pub name: String,
}

/// Compute the name a channel is exposed under.
///
/// Direct-message peers that cannot be found are named with a placeholder
/// rather than failing; any other lookup failure is returned.
pub async fn normalize(client: &dyn ChatClient, channel: &Channel) -> Result<String, FsError> {
    let me = &client.user().id;

    let name = match channel.kind {
        ChannelType::Public => channel.display_name.clone(),
        ChannelType::Private => format!("{}{}", PRIVATE_PREFIX, channel.display_name),
        ChannelType::Group => {
            let members = client.list_channel_members(&channel.id).await?;
            let usernames = members
                .into_iter()
                .filter(|user| &user.id != me)
                .map(|user| user.username)
                .collect();
            format!("{}{}", GROUP_PREFIX, group_display_name(usernames))
        }
        ChannelType::Direct => {
            let peer_id = dm_peer_id(&channel.name, me)
                .ok_or_else(|| FsError::InvalidChannel(channel.name.clone()))?;
            let peer = match client.get_user(peer_id).await {
                Ok(user) => user.username,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(peer_id, channel_id = %channel.id, "direct message peer missing");
                    format!("{}{}", MISSING_USER_PREFIX, peer_id)
                }
                Err(e) => return Err(e.into()),
            };
            format!("{}{}", DIRECT_PREFIX, peer)
        }
    };

    Ok(name)
}

/// Normalize a team's channel listing, failing as a whole if any channel fails
pub async fn normalize_all(
    client: &dyn ChatClient,
    channels: Vec<Channel>,
) -> Result<Vec<NormalizedChannel>, FsError> {
    let mut normalized = Vec::with_capacity(channels.len());
    for channel in channels {
        let name = normalize(client, &channel).await?;
        normalized.push(NormalizedChannel {
            id: channel.id,
            name,
        });
    }
    Ok(normalized)
}

/// The other participant of a direct-message channel.
///
/// DM channel names are the two user ids joined by `__`. A conversation
/// with oneself has our id on both sides.
pub fn dm_peer_id<'a>(channel_name: &'a str, me: &str) -> Option<&'a str> {
    let (a, b) = channel_name.split_once("__")?;
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(if a == me { b } else { a })
}

/// Sorted, comma-separated usernames, cut to the remote's name length limit
fn group_display_name(mut usernames: Vec<String>) -> String {
    usernames.sort();
    let joined = usernames.join(", ");
    match joined.char_indices().nth(GROUP_NAME_MAX_CHARS) {
        Some((cut, _)) => joined[..cut].to_string(),
        None => joined,
    }
}
