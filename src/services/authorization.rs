// Authorization gate - the single capability check every mutating operation consults

use crate::infrastructure::viewer::ViewerContext;
use crate::models::{Comment, Post, UserId};

/// Records that belong to exactly one author
pub trait Authored {
    fn author_id(&self) -> UserId;
}

impl Authored for Post {
    fn author_id(&self) -> UserId {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> UserId {
        self.author_id
    }
}

/// True iff the viewer is the record's author. Anonymous viewers can edit nothing.
pub fn can_edit<T: Authored>(viewer: &ViewerContext, record: &T) -> bool {
    viewer.user_id() == Some(record.author_id())
}
