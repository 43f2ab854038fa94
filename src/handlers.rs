pub mod auth;
pub mod clients;
pub mod emails;
pub mod workshop;
