pub mod admin;
pub mod auth;
pub mod chats;
pub mod health;
pub mod matches;
pub mod profile;
pub mod safety;
