pub mod commands;
pub mod media;
pub mod responses;
pub mod wizard;
