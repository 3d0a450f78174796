pub mod catalog;
pub mod classify;
pub mod probe;
pub mod stability;
pub mod subtitles;
