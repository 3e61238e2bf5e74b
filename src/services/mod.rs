pub mod auth;
pub mod booking;
pub mod mail;
pub mod notification;
pub mod payments;
