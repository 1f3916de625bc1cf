use crate::error::{AccountError, Result};

/// Size of the serialized credential record.
pub const ACCOUNT_INFO_SIZE: usize = 0x17C;

/// Gamertag capacity in UTF-16 code units, including the terminating NUL.
pub const GAMERTAG_UNITS: usize = 0x10;

const OFF_RESERVED_FLAGS: usize = 0x00;
const OFF_LIVE_FLAGS: usize = 0x04;
const OFF_GAMERTAG: usize = 0x08;
const OFF_XUID_ONLINE: usize = 0x28;
const OFF_CACHED_USER_FLAGS: usize = 0x30;
const OFF_NETWORK_ID: usize = 0x34;
const OFF_PASSCODE: usize = 0x38;
const OFF_ONLINE_DOMAIN: usize = 0x3C;
const OFF_KERBEROS_REALM: usize = 0x50;
const OFF_ONLINE_KEY: usize = 0x68;
const OFF_PASSPORT_MEMBERNAME: usize = 0x78;
const OFF_PASSPORT_PASSWORD: usize = 0xEA;
const OFF_OWNER_PASSPORT_MEMBERNAME: usize = 0x10A;

/// Account credential record: online account id, gamertag and the remaining
/// account fields, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub reserved_flags: u32,
    pub live_flags: u32,
    /// Gamertag as native UTF-16 code units, NUL-padded
    pub gamertag: [u16; GAMERTAG_UNITS],
    /// Globally unique account id
    pub xuid_online: u64,
    pub cached_user_flags: u32,
    pub network_id: u32,
    pub passcode: [u8; 4],
    pub online_domain: [u8; 0x14],
    pub online_kerberos_realm: [u8; 0x18],
    pub online_key: [u8; 0x10],
    pub passport_membername: [u8; 0x72],
    pub passport_password: [u8; 0x20],
    pub owner_passport_membername: [u8; 0x72],
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            reserved_flags: 0,
            live_flags: 0,
            gamertag: [0; GAMERTAG_UNITS],
            xuid_online: 0,
            cached_user_flags: 0,
            network_id: 0,
            passcode: [0; 4],
            online_domain: [0; 0x14],
            online_kerberos_realm: [0; 0x18],
            online_key: [0; 0x10],
            passport_membername: [0; 0x72],
            passport_password: [0; 0x20],
            owner_passport_membername: [0; 0x72],
        }
    }
}

impl AccountInfo {
    /// Create a record with only the account id and gamertag set
    pub fn new(xuid_online: u64, gamertag: &str) -> Result<Self> {
        Ok(Self {
            xuid_online,
            gamertag: encode_gamertag(gamertag)?,
            ..Default::default()
        })
    }

    /// Gamertag up to the first NUL
    #[must_use]
    pub fn gamertag(&self) -> String {
        let len = self
            .gamertag
            .iter()
            .position(|unit| *unit == 0)
            .unwrap_or(GAMERTAG_UNITS);
        String::from_utf16_lossy(&self.gamertag[..len])
    }

    pub fn set_gamertag(&mut self, gamertag: &str) -> Result<()> {
        self.gamertag = encode_gamertag(gamertag)?;
        Ok(())
    }

    /// Serialize into the storage layout (big-endian integers and gamertag).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ACCOUNT_INFO_SIZE] {
        let mut out = [0u8; ACCOUNT_INFO_SIZE];
        put(&mut out, OFF_RESERVED_FLAGS, &self.reserved_flags.to_be_bytes());
        put(&mut out, OFF_LIVE_FLAGS, &self.live_flags.to_be_bytes());
        put(&mut out, OFF_GAMERTAG, &gamertag_to_storage(&self.gamertag));
        put(&mut out, OFF_XUID_ONLINE, &self.xuid_online.to_be_bytes());
        put(&mut out, OFF_CACHED_USER_FLAGS, &self.cached_user_flags.to_be_bytes());
        put(&mut out, OFF_NETWORK_ID, &self.network_id.to_be_bytes());
        put(&mut out, OFF_PASSCODE, &self.passcode);
        put(&mut out, OFF_ONLINE_DOMAIN, &self.online_domain);
        put(&mut out, OFF_KERBEROS_REALM, &self.online_kerberos_realm);
        put(&mut out, OFF_ONLINE_KEY, &self.online_key);
        put(&mut out, OFF_PASSPORT_MEMBERNAME, &self.passport_membername);
        put(&mut out, OFF_PASSPORT_PASSWORD, &self.passport_password);
        put(
            &mut out,
            OFF_OWNER_PASSPORT_MEMBERNAME,
            &self.owner_passport_membername,
        );
        out
    }

    /// Parse a record from the storage layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ACCOUNT_INFO_SIZE {
            return Err(AccountError::InvalidLength {
                expected: ACCOUNT_INFO_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            reserved_flags: u32::from_be_bytes(take(bytes, OFF_RESERVED_FLAGS)),
            live_flags: u32::from_be_bytes(take(bytes, OFF_LIVE_FLAGS)),
            gamertag: gamertag_from_storage(&take(bytes, OFF_GAMERTAG)),
            xuid_online: u64::from_be_bytes(take(bytes, OFF_XUID_ONLINE)),
            cached_user_flags: u32::from_be_bytes(take(bytes, OFF_CACHED_USER_FLAGS)),
            network_id: u32::from_be_bytes(take(bytes, OFF_NETWORK_ID)),
            passcode: take(bytes, OFF_PASSCODE),
            online_domain: take(bytes, OFF_ONLINE_DOMAIN),
            online_kerberos_realm: take(bytes, OFF_KERBEROS_REALM),
            online_key: take(bytes, OFF_ONLINE_KEY),
            passport_membername: take(bytes, OFF_PASSPORT_MEMBERNAME),
            passport_password: take(bytes, OFF_PASSPORT_PASSWORD),
            owner_passport_membername: take(bytes, OFF_OWNER_PASSPORT_MEMBERNAME),
        })
    }
}

/// Encode a gamertag into the fixed-width field. One unit is reserved for NUL.
pub fn encode_gamertag(gamertag: &str) -> Result<[u16; GAMERTAG_UNITS]> {
    let units: Vec<u16> = gamertag.encode_utf16().collect();
    if units.len() >= GAMERTAG_UNITS {
        return Err(AccountError::invalid_gamertag(format!(
            "{gamertag:?} is {} UTF-16 units, at most {} allowed",
            units.len(),
            GAMERTAG_UNITS - 1
        )));
    }
    if units.contains(&0) {
        return Err(AccountError::invalid_gamertag("embedded NUL"));
    }
    let mut out = [0u16; GAMERTAG_UNITS];
    out[..units.len()].copy_from_slice(&units);
    Ok(out)
}

/// Byte-order correction for storage: gamertag units are big-endian on disk.
fn gamertag_to_storage(gamertag: &[u16; GAMERTAG_UNITS]) -> [u8; GAMERTAG_UNITS * 2] {
    let mut out = [0u8; GAMERTAG_UNITS * 2];
    for (dst, unit) in out.chunks_exact_mut(2).zip(gamertag) {
        dst.copy_from_slice(&unit.to_be_bytes());
    }
    out
}

fn gamertag_from_storage(bytes: &[u8; GAMERTAG_UNITS * 2]) -> [u16; GAMERTAG_UNITS] {
    let mut out = [0u16; GAMERTAG_UNITS];
    for (unit, src) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *unit = u16::from_be_bytes([src[0], src[1]]);
    }
    out
}

fn put(out: &mut [u8], offset: usize, bytes: &[u8]) {
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

// Callers check the total length first; every field lies inside the record.
fn take<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
