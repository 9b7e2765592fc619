//! OpenCloud authentication
//!
//! Server discovery and the OpenID Connect authorization-code login used by
//! OpenCloud clients.
//!
//! # Module Layout
//!
//! - [`locator`]   -- server input normalization
//! - [`webfinger`] -- RFC 7033 issuer lookup with server fallback
//! - [`discovery`] -- OpenID provider configuration
//! - [`authorize`] -- authorization URL, `state`, callback parsing
//! - [`token`]     -- authorization code exchange
//! - [`session`]   -- session value and session store
//! - [`logout`]    -- IdP-side logout
//! - [`manager`]   -- the [`AuthSessionManager`](manager::AuthSessionManager) tying it together

pub mod authorize;
pub mod discovery;
pub mod locator;
pub mod logout;
pub mod manager;
pub mod session;
pub mod token;
pub mod webfinger;

pub use manager::{AuthSessionManager, InitializeOutcome};
