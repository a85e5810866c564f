//! InfraVault - encrypted credential storage for infrastructure provisioning.
//!
//! This library keeps long-lived service API tokens encrypted at rest under
//! a key derived from the local identity, and seals secrets to remote
//! platform public keys so they can be deposited into a platform's own
//! secret store without plaintext on the wire.

pub mod cloud;
pub mod error;
pub mod identity;
pub mod seal;
pub mod services;
pub mod validate;
pub mod vault;
