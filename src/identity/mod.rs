//! Identity & session model.
//!
//! The identity provider owns sign-in; this module turns its session notifications into a
//! resolved [`User`](crate::data::user::User) profile and applies the first-user bootstrap rule.

pub mod admin;
pub mod profile;
pub mod provider;
pub mod session;

pub use admin::UserAdmin;
pub use provider::{IdentityProvider, ProviderAccount};
pub use session::{Session, SessionHandle, SessionState};
