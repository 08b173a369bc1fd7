//! Spatial indexing.

mod quadtree;

pub use quadtree::{QuadEntity, QuadItem, Quadtree, Rect};
