pub mod auth;
pub mod client_service;
pub mod document_service;
pub mod notification_service;
pub mod workflow;
