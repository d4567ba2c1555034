pub mod auth;
pub mod messaging;
pub mod misc;
pub mod resources;
pub mod users;
