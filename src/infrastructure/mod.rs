// Infrastructure: storage, caching, media and request identity
pub mod cache;
pub mod database;
pub mod media;
pub mod middleware;
pub mod viewer;

pub use cache::Cache;
pub use database::{EntityStore, SqliteStore};
pub use media::MediaStore;
pub use viewer::ViewerContext;
