//! Data models for eventdesk entities.
//!
//! - `User`: the identity record returned by login and the user resource

pub mod user;

pub use user::User;
