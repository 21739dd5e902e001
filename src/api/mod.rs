pub mod auth;
pub mod login;
