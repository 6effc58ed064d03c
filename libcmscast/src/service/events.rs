//! Event system for progress tracking
//!
//! The publishing service emits an [`Event`] for every state change it
//! makes. Events travel over a `tokio::sync::broadcast` channel, so any
//! number of subscribers (daemon logs, CLI output) can listen. With no
//! subscribers, events are dropped immediately and emitters never block.
//!
//! # Example
//!
//! ```no_run
//! use libcmscast::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PostCancelled {
//!     post_id: "abc123".to_string(),
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::SocialPlatform;

pub type EventReceiver = broadcast::Receiver<Event>;

/// Broadcast channel for service events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: Event) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A post and its mapping were created
    PostScheduled {
        post_id: String,
        content_id: String,
        platform: SocialPlatform,
        account_id: String,
        scheduled_time: DateTime<Utc>,
    },

    PostPublished {
        post_id: String,
        platform: SocialPlatform,
        platform_post_id: String,
    },

    /// A failed attempt was pushed back for another try
    RetryScheduled {
        post_id: String,
        platform: SocialPlatform,
        retry_count: u32,
        next_attempt: DateTime<Utc>,
        error: String,
    },

    PostFailed {
        post_id: String,
        platform: SocialPlatform,
        error: String,
    },

    PostCancelled {
        post_id: String,
    },

    /// One dispatch run finished
    DispatchCompleted {
        posts_processed: usize,
        successful_posts: usize,
        failed_posts: usize,
    },
}
