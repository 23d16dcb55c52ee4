pub mod arena;
pub mod size_class;

pub use arena::{Arena, BucketHeader};
pub use size_class::size_class_index;
