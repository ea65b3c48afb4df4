//! Google Drive remote store for classdrive.
//!
//! This module provides the production backend with:
//! - OAuth2 installed-app authentication with automatic token refresh
//! - A JSON token cache shared between runs
//! - Paginated file and permission listing
//! - Full RemoteStore trait implementation over the Drive v3 REST API

pub mod auth;
pub mod client;

pub use auth::{AuthConfig, AuthManager, TokenCache, TokenManager, Tokens};
pub use client::DriveClient;
