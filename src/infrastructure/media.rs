// Media storage for uploaded post images

use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::core::validation::ValidImage;
use crate::error::AppResult;

/// Subdirectory under the media root that holds post images
const POSTS_DIR: &str = "posts";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write a validated image and return its path relative to the media root
    pub async fn save_post_image(&self, image: &ValidImage) -> AppResult<String> {
        let dir = self.root.join(POSTS_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
        tokio::fs::write(dir.join(&file_name), &image.bytes).await?;

        let relative = format!("{}/{}", POSTS_DIR, file_name);
        debug!("Stored post image at {}", relative);
        Ok(relative)
    }
}
