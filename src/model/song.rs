use derive_new::new;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::database::Record;
use crate::table;

use super::{now, Timestamp, UserId};

pub type SongId = Record<Song>;
pub type LikedSongId = Record<LikedSong>;

/// An uploaded track. Only the `author` field matters to the story core,
/// which resolves liked songs to their artists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Song {
    #[new(default)]
    pub id: SongId,
    #[new(value = "now()")]
    pub created_at: Timestamp,

    pub author: UserId,
    pub title: String,
    pub media_url: Url,
}

table!("songs": Song = id);

/// A `(user, song)` like. Owned by the discovery module; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct LikedSong {
    #[new(default)]
    pub id: LikedSongId,
    #[new(value = "now()")]
    pub created_at: Timestamp,

    pub user: UserId,
    pub song: SongId,
}

table!("liked_songs": LikedSong = id);
