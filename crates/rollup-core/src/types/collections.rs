//! Fast hash collections used on every hot path (blocking, union-find, traversal).

pub use rustc_hash::{FxHashMap, FxHashSet};
