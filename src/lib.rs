pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod graph;
pub mod logger;
pub mod model;
pub mod store;
pub mod sweep;
pub mod task;
pub mod view_state;
pub mod watch;

pub mod prelude {
    pub use crate::database::{Database, Record, Table};
    pub use crate::feed::{resolver, FeedKind, FeedResolver, FeedStory};
    pub use crate::graph::{FollowGraph, FollowStore, LikedSongStore, LikedSongs};
    pub use crate::model::*;
    pub use crate::store::StoryStore;
    pub use crate::sweep::Sweeper;
    pub use crate::view_state::ViewTracker;
    pub use crate::watch::{FeedSubscription, FeedWatcher};
}
