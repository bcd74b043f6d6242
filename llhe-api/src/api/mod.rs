//! HTTP API handlers for llhe-api

pub mod admin;
pub mod auth;
pub mod fragments;
pub mod health;
pub mod search;
pub mod transcribe;
pub mod upload;

pub use auth::AuthUser;
