use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::database::Record;
use crate::table;

use super::{now, StoryId, Timestamp, UserId};

pub type ViewRecordId = Record<ViewRecord>;

/// Marks that a viewer has opened a story. Created at most once per
/// `(viewer, story)` pair; the store enforces this with a unique index,
/// and the record is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct ViewRecord {
    #[new(default)]
    pub id: ViewRecordId,

    pub viewer: UserId,
    pub story: StoryId,

    /// Time of the first view.
    #[new(value = "now()")]
    pub viewed_at: Timestamp,
}

table!("story_views": ViewRecord = id);
