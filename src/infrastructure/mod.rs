pub mod cache;
pub mod content;
pub mod database;
pub mod jobs;
pub mod storage;
