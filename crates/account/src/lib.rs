//! # XProfile Account
//!
//! Sealed account credential container for console user profiles.
//!
//! ## Container layout
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────┐
//! │ tag (16) │ confounder 8 │ account record (0x17C)   │
//! └──────────┴──────────────┴──────────────────────────┘
//!            └──────────── RC4 encrypted ──────────────┘
//!
//! tag        = HMAC-SHA1(root, confounder ‖ record)[..16]
//! stream key = HMAC-SHA1(root, tag)[..16]
//! ```
//!
//! The root secret is resolved through [`KeyResolver`]; account files from
//! retail consoles and development kits use different secrets, so readers try
//! both variants in a fixed order with [`unseal_any`].
//!
//! ## Example
//!
//! ```rust
//! use xprofile_account::{seal, unseal, AccountInfo, KeyVariant, StaticKeyResolver};
//!
//! let keys = StaticKeyResolver::default().with_retail([0x5A; 16]);
//! let info = AccountInfo::new(0xE000_0000_0000_0042, "Player").unwrap();
//!
//! let blob = seal(&keys, KeyVariant::Retail, &info).unwrap();
//! let restored = unseal(&keys, KeyVariant::Retail, &blob).unwrap();
//! assert_eq!(restored.gamertag(), "Player");
//! ```

mod codec;
mod error;
mod info;
mod keys;

pub use codec::{
    seal, seal_with_confounder, unseal, unseal_any, CONFOUNDER_LEN, SEALED_ACCOUNT_SIZE,
    SEALED_BODY_SIZE, TAG_LEN,
};
pub use error::{AccountError, Result};
pub use info::{encode_gamertag, AccountInfo, ACCOUNT_INFO_SIZE, GAMERTAG_UNITS};
pub use keys::{
    KeyResolver, KeyVariant, RootSecret, StaticKeyResolver, ACCOUNT_KEY_ID, ROOT_SECRET_LEN,
};
