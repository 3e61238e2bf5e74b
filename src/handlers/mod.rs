pub mod auth;
pub mod booking;
pub mod comments;
pub mod doctors;
pub mod extract;
pub mod health;
pub mod pages;
pub mod profile;
