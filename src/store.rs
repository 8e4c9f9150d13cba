use std::collections::HashSet;

use derive_new::new;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

use crate::database::{Database, QueryError};
use crate::model::{Story, StoryId, Timestamp, UserId};

/// The store rejects `IN`-set filters with more than this many members, so
/// author fan-out queries are split into batches of at most this size.
pub const AUTHOR_BATCH: usize = 10;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreReadError {
    #[snafu(display("failed to read stories: {source}"))]
    Read {
        source: QueryError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreWriteError {
    #[snafu(display("failed to write to the story collection: {source}"))]
    Write {
        source: QueryError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("the store returned no record for the created story"))]
    EmptyWrite {
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(display("failed to update a derived counter: {source}"))]
pub struct CounterUpdateError {
    source: QueryError,
    #[snafu(implicit)]
    location: Location,
}

/// Persistence operations over the `stories` collection.
///
/// Primary mutations (create, delete, highlight) propagate their failures;
/// derived counter updates are logged and swallowed, and fan-out reads
/// degrade to partial results.
#[derive(Debug, Clone, new)]
pub struct StoryStore {
    database: Database,
}

impl StoryStore {
    /// Persist a new story. The caller must not assume the story exists
    /// until this returns the stored copy.
    pub async fn create_story(&self, story: Story) -> Result<Story, StoreWriteError> {
        tracing::info!(story = %story.id, author = %story.author, "publishing story");

        let mut created: Vec<Story> = self
            .database
            .sql("CREATE stories CONTENT $story")
            .bind(("story", story))
            .fetch()
            .await
            .context(WriteSnafu)?;
        let story = created.pop().context(EmptyWriteSnafu)?;

        if let Err(err) = self.bump_story_count(&story.author, 1).await {
            tracing::warn!(author = %story.author, error = %err, "story counter not bumped");
        }

        Ok(story)
    }

    /// Remove a story, scoped to its author. Deleting a story that is already
    /// gone (or belongs to someone else) is a no-op.
    pub async fn delete_story(
        &self,
        story: &StoryId,
        author: &UserId,
    ) -> Result<(), StoreWriteError> {
        let removed: Vec<Story> = self
            .database
            .sql("DELETE $story WHERE author = $author RETURN BEFORE")
            .bind(("story", story.clone()))
            .bind(("author", author.clone()))
            .fetch()
            .await
            .context(WriteSnafu)?;

        if removed.is_empty() {
            tracing::debug!(%story, %author, "delete matched no story");
            return Ok(());
        }

        tracing::info!(%story, %author, "deleted story");
        if let Err(err) = self.bump_story_count(author, -1).await {
            tracing::warn!(%author, error = %err, "story counter not decremented");
        }

        Ok(())
    }

    pub async fn set_highlighted(
        &self,
        story: &StoryId,
        flag: bool,
    ) -> Result<(), StoreWriteError> {
        self.database
            .sql("UPDATE $story SET highlighted = $flag WHERE author != NONE")
            .bind(("story", story.clone()))
            .bind(("flag", flag))
            .execute()
            .await
            .context(WriteSnafu)?;

        tracing::info!(%story, flag, "toggled story highlight");
        Ok(())
    }

    /// Atomic server-side increment. Never read-modify-write: concurrent
    /// viewers bump this counter independently.
    pub async fn increment_view_count(&self, story: &StoryId) -> Result<(), CounterUpdateError> {
        self.database
            .sql("UPDATE $story SET view_count += 1 WHERE author != NONE")
            .bind(("story", story.clone()))
            .execute()
            .await
            .context(CounterUpdateSnafu)?;

        Ok(())
    }

    /// All stories by one author, newest first, with no expiry filter.
    pub async fn stories_by_author(&self, author: &UserId) -> Result<Vec<Story>, StoreReadError> {
        self.database
            .sql("SELECT * FROM stories WHERE author = $author ORDER BY created_at DESC")
            .bind(("author", author.clone()))
            .fetch()
            .await
            .context(ReadSnafu)
    }

    /// An author's highlighted stories, newest first, regardless of expiry.
    pub async fn highlights(&self, author: &UserId) -> Result<Vec<Story>, StoreReadError> {
        self.database
            .sql("SELECT * FROM stories WHERE author = $author AND highlighted = true ORDER BY created_at DESC")
            .bind(("author", author.clone()))
            .fetch()
            .await
            .context(ReadSnafu)
    }

    /// Currently-visible stories from any of the given authors.
    ///
    /// The author set is split into batches of [AUTHOR_BATCH], the batches are
    /// queried concurrently, and whatever came back is concatenated and
    /// deduplicated. A failed batch is logged and dropped; it never aborts the
    /// batches that succeeded.
    pub async fn active_by_authors(&self, authors: &[UserId], now: Timestamp) -> Vec<Story> {
        let batches = authors
            .chunks(AUTHOR_BATCH)
            .map(|batch| self.active_batch(batch.to_vec(), now));

        merge_batches(futures::future::join_all(batches).await)
    }

    async fn active_batch(
        &self,
        authors: Vec<UserId>,
        now: Timestamp,
    ) -> Result<Vec<Story>, StoreReadError> {
        self.database
            .sql("SELECT * FROM stories WHERE author IN $authors AND (highlighted = true OR expires_at > $now)")
            .bind(("authors", authors))
            .bind(("now", now))
            .fetch()
            .await
            .context(ReadSnafu)
    }

    /// Delete every non-highlighted story past its expiry, decrementing the
    /// author counters best-effort. Returns how many stories were removed.
    pub async fn sweep_expired(&self, now: Timestamp) -> Result<usize, StoreWriteError> {
        let removed: Vec<Story> = self
            .database
            .sql("DELETE stories WHERE highlighted = false AND expires_at <= $now RETURN BEFORE")
            .bind(("now", now))
            .fetch()
            .await
            .context(WriteSnafu)?;

        for story in &removed {
            if let Err(err) = self.bump_story_count(&story.author, -1).await {
                tracing::warn!(author = %story.author, error = %err, "story counter not decremented");
            }
        }

        Ok(removed.len())
    }

    async fn bump_story_count(
        &self,
        author: &UserId,
        delta: i64,
    ) -> Result<(), CounterUpdateError> {
        self.database
            .sql("UPDATE $author SET story_count += $delta WHERE display_name != NONE")
            .bind(("author", author.clone()))
            .bind(("delta", delta))
            .execute()
            .await
            .context(CounterUpdateSnafu)?;

        Ok(())
    }
}

fn merge_batches(batches: Vec<Result<Vec<Story>, StoreReadError>>) -> Vec<Story> {
    let mut seen = HashSet::new();
    let mut stories = Vec::new();

    for batch in batches {
        match batch {
            Ok(batch) => {
                for story in batch {
                    if seen.insert(story.id.clone()) {
                        stories.push(story);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "a story batch failed, keeping partial results");
            }
        }
    }

    stories
}
