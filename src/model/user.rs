use derive_new::new;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::database::Record;
use crate::table;

use super::{now, Timestamp};

pub type UserId = Record<User>;

/// An account profile. Stories carry a denormalized snapshot of the author's
/// display name and avatar taken at post time, so this record is only consulted
/// when rendering profiles, never when composing feeds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct User {
    #[new(default)]
    pub id: UserId,
    #[new(value = "now()")]
    pub created_at: Timestamp,

    pub display_name: String,
    pub avatar_url: Url,

    /// Number of stories currently attributed to this user. Maintained
    /// best-effort by the story store.
    #[new(default)]
    pub story_count: i64,
}

table!("users": User = id);
