pub mod clean;
pub mod download;
pub mod parse;
pub mod search;
