//! Derived-asset generation: poster thumbnails, gallery stills, and H.264 proxies.
//! Each submodule shells out to ffmpeg independently; none of them touch the repository
//! layer directly, so `jobs::handlers` is the only place that wires a generated path back
//! onto a `FileRecord`.

pub mod gallery;
pub mod proxy;
pub mod thumb;
