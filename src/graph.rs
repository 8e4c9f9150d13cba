use std::collections::HashSet;
use std::future::Future;

use derive_new::new;

use crate::database::Database;
use crate::define_relation;
use crate::model::{Follow, LikedSong, Song, SongId, UserId};

/// Read-only access to the relationship graph.
pub trait FollowGraph {
    fn followees(&self, viewer: &UserId) -> impl Future<Output = HashSet<UserId>> + Send;
}

/// Read-only access to a viewer's liked songs and their artists.
pub trait LikedSongs {
    fn liked_songs(&self, viewer: &UserId) -> impl Future<Output = HashSet<SongId>> + Send;

    fn song_author(&self, song: &SongId) -> impl Future<Output = Option<UserId>> + Send;
}

define_relation! {
    Follow > followees_of(follower: UserId) > Vec<Follow>
        where "SELECT * FROM follows WHERE follower = $follower"
}

define_relation! {
    LikedSong > liked_by(user: UserId) > Vec<LikedSong>
        where "SELECT * FROM liked_songs WHERE user = $user"
}

define_relation! {
    Song > find(id: SongId) > Option<Song>
        where "SELECT * FROM songs WHERE id = $id LIMIT 1"
}

/// [FollowGraph] served by the `follows` collection. Read failures degrade to
/// an empty followee set so feed composition can carry on.
#[derive(Debug, Clone, new)]
pub struct FollowStore {
    database: Database,
}

impl FollowGraph for FollowStore {
    async fn followees(&self, viewer: &UserId) -> HashSet<UserId> {
        match Follow::followees_of(viewer.clone(), &self.database).await {
            Ok(edges) => edges.into_iter().map(|edge| edge.followee).collect(),
            Err(err) => {
                tracing::warn!(%viewer, error = %err, "followee lookup failed");
                HashSet::new()
            }
        }
    }
}

/// [LikedSongs] served by the `liked_songs` and `songs` collections.
#[derive(Debug, Clone, new)]
pub struct LikedSongStore {
    database: Database,
}

impl LikedSongs for LikedSongStore {
    async fn liked_songs(&self, viewer: &UserId) -> HashSet<SongId> {
        match LikedSong::liked_by(viewer.clone(), &self.database).await {
            Ok(likes) => likes.into_iter().map(|like| like.song).collect(),
            Err(err) => {
                tracing::warn!(%viewer, error = %err, "liked song lookup failed");
                HashSet::new()
            }
        }
    }

    /// A song that cannot be resolved is skipped by the caller, so both a
    /// missing record and a failed lookup come back as `None`.
    async fn song_author(&self, song: &SongId) -> Option<UserId> {
        match Song::find(song.clone(), &self.database).await {
            Ok(Some(song)) => Some(song.author),
            Ok(None) => {
                tracing::debug!(%song, "liked song no longer exists, skipping");
                None
            }
            Err(err) => {
                tracing::warn!(%song, error = %err, "song author lookup failed, skipping");
                None
            }
        }
    }
}
