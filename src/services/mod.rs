// Services: feed assembly, social graph, authorization and post authoring
pub mod authorization;
pub mod feed;
pub mod posts;
pub mod profile;
pub mod social_graph;

pub use authorization::{can_edit, Authored};
pub use feed::{Feed, FeedAssembler};
pub use posts::{EditOutcome, PostDetail, PostService};
pub use profile::{profile_view, ProfileView};
pub use social_graph::SocialGraph;
