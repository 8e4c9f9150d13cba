use std::collections::HashSet;

use derive_new::new;

use crate::database::{Database, QueryError};
use crate::model::{StoryId, UserId, ViewRecord};
use crate::store::StoryStore;

/// Records which stories a viewer has opened.
///
/// Marking is idempotent per `(viewer, story)` pair: the first call creates a
/// [ViewRecord] and bumps the story's view counter, every later call is a
/// no-op. Failures never reach the caller; not recording a view must never
/// block the viewer from the content itself.
#[derive(Debug, Clone, new)]
pub struct ViewTracker {
    database: Database,
    store: StoryStore,
}

impl ViewTracker {
    pub async fn mark_viewed(&self, viewer: &UserId, story: &StoryId) {
        if let Err(err) = self.try_mark_viewed(viewer, story).await {
            tracing::warn!(%viewer, %story, error = %err, "story view not recorded");
        }
    }

    /// Returns whether this call recorded the first view of the pair.
    ///
    /// Check-then-create: a concurrent duplicate from the same viewer can
    /// slip past the check, but the unique `(viewer, story)` index turns the
    /// losing create into an error instead of a second record. The only
    /// racing artifact left is a possible extra view-count increment.
    pub async fn try_mark_viewed(
        &self,
        viewer: &UserId,
        story: &StoryId,
    ) -> Result<bool, QueryError> {
        let existing: Vec<ViewRecord> = self
            .database
            .sql("SELECT * FROM story_views WHERE viewer = $viewer AND story = $story")
            .bind(("viewer", viewer.clone()))
            .bind(("story", story.clone()))
            .fetch()
            .await?;

        if !existing.is_empty() {
            return Ok(false);
        }

        let record = ViewRecord::new(viewer.clone(), story.clone());
        self.database
            .sql("CREATE story_views CONTENT $record")
            .bind(("record", record))
            .execute()
            .await?;

        if let Err(err) = self.store.increment_view_count(story).await {
            tracing::warn!(%story, error = %err, "view counter not bumped");
        }

        Ok(true)
    }

    /// Every story id the viewer has a view record for. A viewer with no
    /// records (or a failed read) yields an empty set, never an error.
    pub async fn viewed_story_ids(&self, viewer: &UserId) -> HashSet<StoryId> {
        let records: Result<Vec<ViewRecord>, _> = self
            .database
            .sql("SELECT * FROM story_views WHERE viewer = $viewer")
            .bind(("viewer", viewer.clone()))
            .fetch()
            .await;

        match records {
            Ok(records) => records.into_iter().map(|record| record.story).collect(),
            Err(err) => {
                tracing::warn!(%viewer, error = %err, "viewed set unavailable, treating all stories as unviewed");
                HashSet::new()
            }
        }
    }
}
