use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::database::Record;
use crate::table;

use super::{now, Timestamp, UserId};

pub type FollowId = Record<Follow>;

/// A directed edge in the relationship graph. Owned by the social module;
/// the story core only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Follow {
    #[new(default)]
    pub id: FollowId,
    #[new(value = "now()")]
    pub created_at: Timestamp,

    pub follower: UserId,
    pub followee: UserId,
}

table!("follows": Follow = id);
