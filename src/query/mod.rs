pub mod builder;
pub mod period;

pub use builder::{AggregateQuery, SortOrder};
pub use period::{history_bucket, resolve_window, Bucket, DateWindow, WindowMode};
