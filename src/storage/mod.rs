mod feeds;
mod folders;
mod items;
mod schema;
mod stories;
mod types;

pub use items::MAX_ITEMS_PER_QUERY;
pub use schema::Database;
pub use types::{DatabaseError, Feed, FeedItem, Folder, NewFeed, NewFeedItem, NewStory, Story};
