#![forbid(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod content_type;
pub mod convert;
pub mod discover;
pub mod formats;
pub mod key;
pub mod logging;
pub mod manifest;
pub mod node;
pub mod resolve;
pub mod rewrite;
pub mod transfer;
pub mod tree_store;
