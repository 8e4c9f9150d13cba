use std::collections::HashSet;
use std::future::Future;

use derive_new::new;
use serde::Serialize;

use crate::database::Database;
use crate::graph::{FollowGraph, FollowStore, LikedSongStore, LikedSongs};
use crate::model::{now, Story, StoryId, Timestamp, UserId};
use crate::store::StoryStore;
use crate::view_state::ViewTracker;

/// The story reads the resolver composes feeds from. Implementations degrade
/// to empty results on failure; they never abort the whole feed.
pub trait StorySource {
    /// Currently-visible stories from the given authors.
    fn active_by_authors(
        &self,
        authors: Vec<UserId>,
        now: Timestamp,
    ) -> impl Future<Output = Vec<Story>> + Send;

    /// Everything an author posted, unfiltered by expiry.
    fn author_stories(&self, author: &UserId) -> impl Future<Output = Vec<Story>> + Send;

    /// An author's highlighted stories.
    fn author_highlights(&self, author: &UserId) -> impl Future<Output = Vec<Story>> + Send;
}

impl StorySource for StoryStore {
    async fn active_by_authors(&self, authors: Vec<UserId>, now: Timestamp) -> Vec<Story> {
        self.active_by_authors(&authors, now).await
    }

    async fn author_stories(&self, author: &UserId) -> Vec<Story> {
        match self.stories_by_author(author).await {
            Ok(stories) => stories,
            Err(err) => {
                tracing::warn!(%author, error = %err, "author stories unavailable");
                Vec::new()
            }
        }
    }

    async fn author_highlights(&self, author: &UserId) -> Vec<Story> {
        match self.highlights(author).await {
            Ok(stories) => stories,
            Err(err) => {
                tracing::warn!(%author, error = %err, "highlights unavailable");
                Vec::new()
            }
        }
    }
}

/// The viewed-set used to annotate feeds.
pub trait ViewState {
    fn viewed_story_ids(&self, viewer: &UserId) -> impl Future<Output = HashSet<StoryId>> + Send;
}

impl ViewState for ViewTracker {
    async fn viewed_story_ids(&self, viewer: &UserId) -> HashSet<StoryId> {
        self.viewed_story_ids(viewer).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Following,
    LikedArtists,
}

/// A story annotated with whether the viewer has already opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStory {
    pub story: Story,
    pub is_viewed: bool,
}

/// Computes the ordered, deduplicated, viewed-annotated story list for a
/// viewer. Candidate authors come from the relationship graph (following
/// feed) or from the authors of the viewer's liked songs (liked-artist feed);
/// both paths then share the same fan-out, annotation and ordering.
#[derive(Debug, Clone, new)]
pub struct FeedResolver<S, V, F, L> {
    stories: S,
    views: V,
    follows: F,
    likes: L,
}

/// The resolver wired to the store-backed providers.
pub type DbFeedResolver = FeedResolver<StoryStore, ViewTracker, FollowStore, LikedSongStore>;

pub fn resolver(database: &Database) -> DbFeedResolver {
    let store = StoryStore::new(database.clone());
    let views = ViewTracker::new(database.clone(), store.clone());

    FeedResolver::new(
        store,
        views,
        FollowStore::new(database.clone()),
        LikedSongStore::new(database.clone()),
    )
}

impl<S, V, F, L> FeedResolver<S, V, F, L>
where
    S: StorySource,
    V: ViewState,
    F: FollowGraph,
    L: LikedSongs,
{
    pub async fn feed(&self, kind: FeedKind, viewer: &UserId) -> Vec<FeedStory> {
        self.feed_at(kind, viewer, now()).await
    }

    pub async fn feed_at(&self, kind: FeedKind, viewer: &UserId, now: Timestamp) -> Vec<FeedStory> {
        match kind {
            FeedKind::Following => self.following_feed_at(viewer, now).await,
            FeedKind::LikedArtists => self.liked_artist_feed_at(viewer, now).await,
        }
    }

    pub async fn following_feed(&self, viewer: &UserId) -> Vec<FeedStory> {
        self.following_feed_at(viewer, now()).await
    }

    pub async fn following_feed_at(&self, viewer: &UserId, now: Timestamp) -> Vec<FeedStory> {
        let mut authors = self.follows.followees(viewer).await;
        authors.remove(viewer);

        if authors.is_empty() {
            tracing::debug!(%viewer, "viewer follows nobody, skipping story lookup");
            return Vec::new();
        }

        self.compose(viewer, authors, now).await
    }

    pub async fn liked_artist_feed(&self, viewer: &UserId) -> Vec<FeedStory> {
        self.liked_artist_feed_at(viewer, now()).await
    }

    pub async fn liked_artist_feed_at(&self, viewer: &UserId, now: Timestamp) -> Vec<FeedStory> {
        let songs = self.likes.liked_songs(viewer).await;
        if songs.is_empty() {
            tracing::debug!(%viewer, "viewer liked no songs, skipping story lookup");
            return Vec::new();
        }

        let mut authors = HashSet::new();
        for song in &songs {
            if let Some(author) = self.likes.song_author(song).await {
                authors.insert(author);
            }
        }
        authors.remove(viewer);

        if authors.is_empty() {
            return Vec::new();
        }

        self.compose(viewer, authors, now).await
    }

    pub async fn author_stories(&self, author: &UserId) -> Vec<Story> {
        self.stories.author_stories(author).await
    }

    pub async fn highlights(&self, author: &UserId) -> Vec<Story> {
        self.stories.author_highlights(author).await
    }

    async fn compose(
        &self,
        viewer: &UserId,
        authors: HashSet<UserId>,
        now: Timestamp,
    ) -> Vec<FeedStory> {
        let stories = self
            .stories
            .active_by_authors(authors.into_iter().collect(), now)
            .await;
        let viewed = self.views.viewed_story_ids(viewer).await;

        let mut feed: Vec<FeedStory> = stories
            .into_iter()
            .filter(|story| story.visible_at(now))
            .map(|story| FeedStory {
                is_viewed: viewed.contains(&story.id),
                story,
            })
            .collect();

        sort_feed(&mut feed);
        feed
    }
}

/// Unviewed stories first, newest first within each group. The sort is stable
/// so equal timestamps keep their arrival order.
pub fn sort_feed(feed: &mut [FeedStory]) {
    feed.sort_by(|a, b| {
        a.is_viewed
            .cmp(&b.is_viewed)
            .then(b.story.created_at.cmp(&a.story.created_at))
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use url::Url;

    use crate::model::{MediaType, SongId};

    use super::*;

    fn story_by(author: &UserId, created_at: i64) -> Story {
        Story::posted_at(
            author.clone(),
            "rin".to_string(),
            Url::parse("https://cdn.example/rin.png").unwrap(),
            Url::parse("https://cdn.example/story.jpg").unwrap(),
            MediaType::Image,
            None,
            Timestamp::from_millis(created_at),
        )
    }

    fn feed_story(created_at: i64, is_viewed: bool) -> FeedStory {
        FeedStory {
            story: story_by(&UserId::uuid(), created_at),
            is_viewed,
        }
    }

    #[derive(Debug, Default, Clone)]
    struct StubStories {
        stories: Vec<Story>,
        calls: Arc<AtomicUsize>,
        requested_authors: Arc<Mutex<Vec<UserId>>>,
    }

    impl StorySource for StubStories {
        async fn active_by_authors(&self, authors: Vec<UserId>, _now: Timestamp) -> Vec<Story> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested_authors.lock().unwrap().extend(authors);
            self.stories.clone()
        }

        async fn author_stories(&self, _author: &UserId) -> Vec<Story> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stories.clone()
        }

        async fn author_highlights(&self, _author: &UserId) -> Vec<Story> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stories.clone()
        }
    }

    #[derive(Debug, Default, Clone)]
    struct StubViews(HashSet<StoryId>);

    impl ViewState for StubViews {
        async fn viewed_story_ids(&self, _viewer: &UserId) -> HashSet<StoryId> {
            self.0.clone()
        }
    }

    #[derive(Debug, Default, Clone)]
    struct StubFollows(HashSet<UserId>);

    impl FollowGraph for StubFollows {
        async fn followees(&self, _viewer: &UserId) -> HashSet<UserId> {
            self.0.clone()
        }
    }

    #[derive(Debug, Default, Clone)]
    struct StubLikes {
        songs: HashSet<SongId>,
        authors: HashMap<SongId, UserId>,
    }

    impl LikedSongs for StubLikes {
        async fn liked_songs(&self, _viewer: &UserId) -> HashSet<SongId> {
            self.songs.clone()
        }

        async fn song_author(&self, song: &SongId) -> Option<UserId> {
            self.authors.get(song).cloned()
        }
    }

    fn resolver_with(
        stories: StubStories,
        views: StubViews,
        follows: StubFollows,
        likes: StubLikes,
    ) -> FeedResolver<StubStories, StubViews, StubFollows, StubLikes> {
        FeedResolver::new(stories, views, follows, likes)
    }

    #[test]
    fn unviewed_stories_come_first_newest_first() {
        let mut feed = vec![
            feed_story(100, true),
            feed_story(50, false),
            feed_story(200, false),
        ];

        sort_feed(&mut feed);

        let order: Vec<(i64, bool)> = feed
            .iter()
            .map(|entry| (entry.story.created_at.millis(), entry.is_viewed))
            .collect();
        assert_eq!(order, vec![(200, false), (50, false), (100, true)]);
    }

    #[tokio::test]
    async fn following_nobody_short_circuits_the_story_lookup() {
        let stories = StubStories::default();
        let calls = stories.calls.clone();
        let resolver = resolver_with(
            stories,
            StubViews::default(),
            StubFollows::default(),
            StubLikes::default(),
        );

        let feed = resolver
            .following_feed_at(&UserId::uuid(), Timestamp::from_millis(0))
            .await;

        assert!(feed.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no story query expected");
    }

    #[tokio::test]
    async fn viewer_is_excluded_from_their_own_feed() {
        let viewer = UserId::uuid();
        let other = UserId::uuid();
        let follows = StubFollows([viewer.clone(), other.clone()].into_iter().collect());
        let stories = StubStories::default();
        let requested = stories.requested_authors.clone();
        let resolver = resolver_with(
            stories,
            StubViews::default(),
            follows,
            StubLikes::default(),
        );

        resolver
            .following_feed_at(&viewer, Timestamp::from_millis(0))
            .await;

        let requested = requested.lock().unwrap();
        assert_eq!(requested.as_slice(), [other]);
    }

    #[tokio::test]
    async fn feed_annotates_viewed_stories() {
        let author = UserId::uuid();
        let seen = story_by(&author, 10);
        let fresh = story_by(&author, 20);
        let stories = StubStories {
            stories: vec![seen.clone(), fresh.clone()],
            ..Default::default()
        };
        let views = StubViews([seen.id.clone()].into_iter().collect());
        let follows = StubFollows([author].into_iter().collect());
        let resolver = resolver_with(stories, views, follows, StubLikes::default());

        let feed = resolver
            .following_feed_at(&UserId::uuid(), Timestamp::from_millis(30))
            .await;

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].story.id, fresh.id);
        assert!(!feed[0].is_viewed);
        assert_eq!(feed[1].story.id, seen.id);
        assert!(feed[1].is_viewed);
    }

    #[tokio::test]
    async fn unresolvable_songs_are_skipped_not_fatal() {
        let viewer = UserId::uuid();
        let artist = UserId::uuid();
        let known = SongId::uuid();
        let orphan = SongId::uuid();

        let likes = StubLikes {
            songs: [known.clone(), orphan].into_iter().collect(),
            authors: [(known, artist.clone())].into_iter().collect(),
        };
        let stories = StubStories {
            stories: vec![story_by(&artist, 5)],
            ..Default::default()
        };
        let resolver = resolver_with(stories, StubViews::default(), StubFollows::default(), likes);

        let feed = resolver
            .liked_artist_feed_at(&viewer, Timestamp::from_millis(10))
            .await;

        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn expired_stories_are_filtered_even_if_the_source_returns_them() {
        let author = UserId::uuid();
        let expired = story_by(&author, 0);
        let mut highlighted = story_by(&author, 0);
        highlighted.highlighted = true;

        let stories = StubStories {
            stories: vec![expired, highlighted.clone()],
            ..Default::default()
        };
        let follows = StubFollows([author].into_iter().collect());
        let resolver = resolver_with(stories, StubViews::default(), follows, StubLikes::default());

        let after_expiry = Timestamp::from_millis(crate::model::STORY_TTL_MS);
        let feed = resolver
            .following_feed_at(&UserId::uuid(), after_expiry)
            .await;

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].story.id, highlighted.id);
    }
}
