use subtle::ConstantTimeEq;

use crate::error::{AccountError, Result};
use crate::info::{AccountInfo, ACCOUNT_INFO_SIZE};
use crate::keys::{KeyResolver, KeyVariant, RootSecret, ACCOUNT_KEY_ID};

/// Width of the stored integrity tag (truncated HMAC-SHA1 digest).
pub const TAG_LEN: usize = 0x10;

/// Width of the random confounder prefixed to the payload.
pub const CONFOUNDER_LEN: usize = 8;

/// Width of the RC4 key taken from the key-derivation digest.
const STREAM_KEY_LEN: usize = 0x10;

const DIGEST_LEN: usize = 0x14;

/// Bytes covered by encryption: confounder followed by the credential record.
pub const SEALED_BODY_SIZE: usize = CONFOUNDER_LEN + ACCOUNT_INFO_SIZE;

/// Total size of a sealed account container.
pub const SEALED_ACCOUNT_SIZE: usize = TAG_LEN + SEALED_BODY_SIZE;

/// Decrypt and verify a sealed account container with one key variant.
pub fn unseal<R: KeyResolver + ?Sized>(
    resolver: &R,
    variant: KeyVariant,
    blob: &[u8],
) -> Result<AccountInfo> {
    let secret = root_secret(resolver, variant)?;
    if blob.len() != SEALED_ACCOUNT_SIZE {
        return Err(AccountError::InvalidLength {
            expected: SEALED_ACCOUNT_SIZE,
            actual: blob.len(),
        });
    }

    let (tag, ciphertext) = blob.split_at(TAG_LEN);
    let mut body = [0u8; SEALED_BODY_SIZE];
    body.copy_from_slice(ciphertext);
    apply_keystream(&stream_key(&secret, tag)?, &mut body)?;

    let expected = hmac_sha1(&secret, &body)?;
    if !bool::from(expected[..TAG_LEN].ct_eq(tag)) {
        return Err(AccountError::IntegrityFailure);
    }

    AccountInfo::from_bytes(&body[CONFOUNDER_LEN..])
}

/// Unseal trying every key variant in [`KeyVariant::FALLBACK_ORDER`].
///
/// Returns the credential together with the variant that verified it. When no
/// variant has a root secret the result is [`AccountError::MissingKey`]; when at
/// least one secret existed but none verified, [`AccountError::IntegrityFailure`].
pub fn unseal_any<R: KeyResolver + ?Sized>(
    resolver: &R,
    blob: &[u8],
) -> Result<(AccountInfo, KeyVariant)> {
    let mut last_err = None;
    for variant in KeyVariant::FALLBACK_ORDER {
        match unseal(resolver, variant, blob) {
            Ok(info) => {
                log::debug!("Account container verified with {variant} key");
                return Ok((info, variant));
            }
            Err(err) if err.is_retryable() => {
                log::debug!("Account container did not unseal with {variant} key: {err}");
                // Integrity failures take precedence over missing keys.
                if matches!(err, AccountError::IntegrityFailure) || last_err.is_none() {
                    last_err = Some(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or(AccountError::MissingKey {
        key_id: ACCOUNT_KEY_ID,
        variant: KeyVariant::Retail,
    }))
}

/// Seal a credential record with a fresh random confounder.
pub fn seal<R: KeyResolver + ?Sized>(
    resolver: &R,
    variant: KeyVariant,
    info: &AccountInfo,
) -> Result<Vec<u8>> {
    let mut confounder = [0u8; CONFOUNDER_LEN];
    getrandom::getrandom(&mut confounder).map_err(|e| AccountError::Random(e.to_string()))?;
    seal_with_confounder(resolver, variant, info, confounder)
}

/// Seal a credential record with a caller-chosen confounder.
pub fn seal_with_confounder<R: KeyResolver + ?Sized>(
    resolver: &R,
    variant: KeyVariant,
    info: &AccountInfo,
    confounder: [u8; CONFOUNDER_LEN],
) -> Result<Vec<u8>> {
    let secret = root_secret(resolver, variant)?;

    let mut body = [0u8; SEALED_BODY_SIZE];
    body[..CONFOUNDER_LEN].copy_from_slice(&confounder);
    body[CONFOUNDER_LEN..].copy_from_slice(&info.to_bytes());

    let digest = hmac_sha1(&secret, &body)?;
    let tag = &digest[..TAG_LEN];
    apply_keystream(&stream_key(&secret, tag)?, &mut body)?;

    let mut out = Vec::with_capacity(SEALED_ACCOUNT_SIZE);
    out.extend_from_slice(tag);
    out.extend_from_slice(&body);
    Ok(out)
}

fn root_secret<R: KeyResolver + ?Sized>(resolver: &R, variant: KeyVariant) -> Result<RootSecret> {
    resolver
        .root_secret(ACCOUNT_KEY_ID, variant)
        .ok_or(AccountError::MissingKey {
            key_id: ACCOUNT_KEY_ID,
            variant,
        })
}

fn stream_key(secret: &RootSecret, tag: &[u8]) -> Result<[u8; STREAM_KEY_LEN]> {
    let digest = hmac_sha1(secret, tag)?;
    let mut key = [0u8; STREAM_KEY_LEN];
    key.copy_from_slice(&digest[..STREAM_KEY_LEN]);
    Ok(key)
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; DIGEST_LEN]> {
    use hmac::{Hmac, Mac};
    use sha1::Sha1;

    let mut mac =
        <Hmac<Sha1> as Mac>::new_from_slice(key).map_err(|_| AccountError::InvalidLength {
            expected: crate::keys::ROOT_SECRET_LEN,
            actual: key.len(),
        })?;
    mac.update(data);
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(digest)
}

// RC4 is symmetric: the same call encrypts and decrypts.
fn apply_keystream(key: &[u8; STREAM_KEY_LEN], data: &mut [u8]) -> Result<()> {
    use rc4::consts::U16;
    use rc4::{KeyInit, Rc4, StreamCipher};

    let mut cipher =
        <Rc4<U16> as KeyInit>::new_from_slice(key).map_err(|_| AccountError::InvalidLength {
            expected: STREAM_KEY_LEN,
            actual: key.len(),
        })?;
    cipher.apply_keystream(data);
    Ok(())
}
