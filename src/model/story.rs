use serde::{Deserialize, Serialize};
use url::Url;

use crate::database::Record;
use crate::table;

use super::{now, Timestamp, UserId};

pub type StoryId = Record<Story>;

/// How long a story stays visible before the sweep may remove it.
pub const STORY_TTL_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// An ephemeral media post. Expiry is computed once at creation and stored;
/// it is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Story {
    pub id: StoryId,
    pub author: UserId,

    /// Snapshot of the author's profile at post time, not live-updated.
    pub author_name: String,
    pub author_avatar: Url,

    pub media_url: Url,
    pub media_type: MediaType,
    #[serde(default)]
    pub caption: Option<String>,

    pub created_at: Timestamp,
    pub expires_at: Timestamp,

    /// Incremented once per distinct viewer, through the store's atomic
    /// increment only.
    pub view_count: i64,

    /// Once set, the story is exempt from expiry filtering and from the
    /// sweep. Only an explicit delete removes it.
    pub highlighted: bool,
}

impl Story {
    pub fn new(
        author: UserId,
        author_name: String,
        author_avatar: Url,
        media_url: Url,
        media_type: MediaType,
        caption: Option<String>,
    ) -> Self {
        Self::posted_at(
            author,
            author_name,
            author_avatar,
            media_url,
            media_type,
            caption,
            now(),
        )
    }

    /// Builds a story as if it had been posted at `created_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn posted_at(
        author: UserId,
        author_name: String,
        author_avatar: Url,
        media_url: Url,
        media_type: MediaType,
        caption: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: StoryId::uuid(),
            author,
            author_name,
            author_avatar,
            media_url,
            media_type,
            caption,
            created_at,
            expires_at: created_at.plus_millis(STORY_TTL_MS),
            view_count: 0,
            highlighted: false,
        }
    }

    /// A story belongs in feeds iff it is highlighted or not yet expired.
    pub fn visible_at(&self, now: Timestamp) -> bool {
        self.highlighted || now < self.expires_at
    }
}

table!("stories": Story = id);
