use std::fmt;

/// Key id of the root secret that protects the account container.
pub const ACCOUNT_KEY_ID: u32 = 0x19;

/// Width of every root secret in bytes.
pub const ROOT_SECRET_LEN: usize = 0x10;

pub type RootSecret = [u8; ROOT_SECRET_LEN];

/// Which deployment profile a root secret belongs to.
///
/// Account files written by retail consoles and by development kits are sealed
/// with different root secrets. Readers try [`KeyVariant::Retail`] first and fall
/// back to [`KeyVariant::Devkit`], see [`KeyVariant::FALLBACK_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyVariant {
    Retail,
    Devkit,
}

impl KeyVariant {
    /// Order in which variants are attempted when unsealing.
    pub const FALLBACK_ORDER: [Self; 2] = [Self::Retail, Self::Devkit];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Devkit => "devkit",
        }
    }
}

impl fmt::Display for KeyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of root secrets.
pub trait KeyResolver {
    /// Look up a root secret; `None` when the key is not provisioned.
    fn root_secret(&self, key_id: u32, variant: KeyVariant) -> Option<RootSecret>;
}

impl<T: KeyResolver + ?Sized> KeyResolver for &T {
    fn root_secret(&self, key_id: u32, variant: KeyVariant) -> Option<RootSecret> {
        (**self).root_secret(key_id, variant)
    }
}

/// Resolver holding the account root secret for each variant in memory.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    retail: Option<RootSecret>,
    devkit: Option<RootSecret>,
}

impl StaticKeyResolver {
    #[must_use]
    pub const fn new(retail: Option<RootSecret>, devkit: Option<RootSecret>) -> Self {
        Self { retail, devkit }
    }

    /// Builder: set the retail secret
    #[must_use]
    pub const fn with_retail(mut self, secret: RootSecret) -> Self {
        self.retail = Some(secret);
        self
    }

    /// Builder: set the devkit secret
    #[must_use]
    pub const fn with_devkit(mut self, secret: RootSecret) -> Self {
        self.devkit = Some(secret);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.retail.is_none() && self.devkit.is_none()
    }
}

impl fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyResolver")
            .field("retail", &self.retail.is_some())
            .field("devkit", &self.devkit.is_some())
            .finish()
    }
}

impl KeyResolver for StaticKeyResolver {
    fn root_secret(&self, key_id: u32, variant: KeyVariant) -> Option<RootSecret> {
        if key_id != ACCOUNT_KEY_ID {
            return None;
        }
        match variant {
            KeyVariant::Retail => self.retail,
            KeyVariant::Devkit => self.devkit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_resolver_only_serves_account_key() {
        let resolver = StaticKeyResolver::default().with_retail([1; ROOT_SECRET_LEN]);
        assert_eq!(
            resolver.root_secret(ACCOUNT_KEY_ID, KeyVariant::Retail),
            Some([1; ROOT_SECRET_LEN])
        );
        assert_eq!(resolver.root_secret(ACCOUNT_KEY_ID, KeyVariant::Devkit), None);
        assert_eq!(resolver.root_secret(0x1A, KeyVariant::Retail), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let resolver = StaticKeyResolver::new(Some([0xAB; ROOT_SECRET_LEN]), None);
        let rendered = format!("{resolver:?}");
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("retail: true"));
    }
}
