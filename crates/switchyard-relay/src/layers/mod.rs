//! Built-in stack layers.

#[cfg(feature = "encryption")]
mod encryption;

#[cfg(feature = "encryption")]
pub use encryption::AesGcmEncryption;
