//! In-memory stand-in for the chat service.
//!
//! `MockChatClient` implements [`ChatClient`](crate::chat::ChatClient)
//! against local state so filesystem behaviour can be exercised without a
//! server: entity tags move when the data they cover changes, individual
//! operations can be made to fail, and side-effecting calls are recorded.

mod mock;

pub use mock::{channel, post, MockChatClient, MockOp};
