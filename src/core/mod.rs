// Core primitives shared by the services
pub mod paginator;
pub mod validation;

pub use paginator::{Page, Paginator, POSTS_PER_PAGE};
