//! Content resolution: which rule, template and output path apply to a file.

pub mod entry;
pub mod front_matter;
mod trie;

pub use entry::{ContentEntry, resolve};
pub use trie::PathTrie;
