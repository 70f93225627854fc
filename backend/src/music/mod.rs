pub mod queries;
pub mod spotify;
