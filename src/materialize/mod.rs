//! Host tree discovery and mirroring into the sandbox namespace.

pub mod resolve;
pub mod tree;

pub use resolve::{resolve_source_dir, resolve_source_dir_in};
pub use tree::{MaterializeReport, TreeMode, has_matching_file, materialize};
