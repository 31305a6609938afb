//! Data model for Authforge.
//!
//! This crate defines the values that the rest of the workspace passes
//! around:
//!
//! - **Types** ([`Session`], [`User`], [`AuthChangeEvent`], [`AuthState`],
//!   [`AuthResponse`], [`PersistedSession`]): what a login looks like and
//!   what observers are told when it changes.
//! - **Params** ([`Contact`], [`OtpType`], [`Provider`] and the option
//!   structs): inputs to the authentication flows.
//! - **Decoding** ([`decode`]): turning JSON responses into those types.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw JSON) and session
//! (lifecycle). It knows nothing about timers or the network.
//!
//! ```text
//! Transport (JSON) → Protocol (Session, User) → Session (lifecycle, refresh)
//! ```

pub mod decode;
mod error;
mod params;
mod types;

pub use error::ProtocolError;
pub use params::{
    Contact, OAuthOptions, OtpOptions, OtpType, Provider, SignUpOptions,
    UserAttributes,
};
pub use types::{
    AuthChangeEvent, AuthResponse, AuthState, PersistedSession, Session, User,
};
