//! Streaming at-rest encryption for backup archives.
//!
//! Envelope format: `IV (16 B) || ciphertext || HMAC-SHA256 (32 B)`.
//! The cipher is AES-256-CTR over the compressed archive stream; the MAC
//! covers `IV || ciphertext`. Cipher and MAC subkeys are derived from the
//! 32-byte master key with HMAC-SHA256 under distinct ASCII labels, so the
//! master key itself never touches either primitive directly.
//!
//! The archive checksum (SHA-256 of the compressed bytes) and the HMAC
//! tail authenticate different things: the checksum binds the archive
//! content, the HMAC binds the encrypted-at-rest artifact.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{EncryptionError, EncryptionResult};

/// IV length in bytes.
pub const IV_LEN: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const MAC_LEN: usize = 32;

/// Smallest well-formed encrypted artifact (empty ciphertext).
pub const MIN_ARTIFACT_LEN: u64 = (IV_LEN + MAC_LEN) as u64;

const CIPHER_LABEL: &[u8] = b"aegis-backup-cipher-v1";
const MAC_LABEL: &[u8] = b"aegis-backup-mac-v1";
const CHUNK_SIZE: usize = 64 * 1024;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// The 32-byte master key supplied out of band.
///
/// Lives in process memory for the process lifetime; zeroized on drop,
/// never logged, serialized, or written to disk.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; 32]>);

impl MasterKey {
    /// Parse a 64-hex-character key.
    pub fn from_hex(raw: &str) -> EncryptionResult<Self> {
        let bytes = hex::decode(raw.trim())
            .map_err(|e| EncryptionError::InvalidKey(format!("not valid hex: {}", e)))?;
        let key: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            EncryptionError::InvalidKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(Zeroizing::new(key)))
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *key);
        Self(key)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Streaming cipher bound to one master key.
pub struct ArchiveCipher {
    cipher_key: Zeroizing<[u8; 32]>,
    mac_key: Zeroizing<[u8; 32]>,
}

impl ArchiveCipher {
    /// Derive the cipher and MAC subkeys from the master key.
    pub fn new(master: &MasterKey) -> EncryptionResult<Self> {
        Ok(Self {
            cipher_key: derive_subkey(&master.0, CIPHER_LABEL)?,
            mac_key: derive_subkey(&master.0, MAC_LABEL)?,
        })
    }

    /// Encrypt `src` into `dst`, streaming in fixed-size chunks.
    ///
    /// A fresh random IV is generated per call; IVs are never reused.
    /// Returns the total artifact size in bytes.
    pub fn encrypt_file(&self, src: &Path, dst: &Path) -> EncryptionResult<u64> {
        let mut reader = BufReader::new(File::open(src)?);
        let mut writer = BufWriter::new(File::create(dst)?);

        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let mut cipher = Aes256Ctr::new_from_slices(&self.cipher_key[..], &iv)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(&self.mac_key[..])
            .map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;

        writer.write_all(&iv)?;
        mac.update(&iv);

        let mut total = MIN_ARTIFACT_LEN;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let chunk = &mut buf[..n];
            cipher.apply_keystream(chunk);
            mac.update(chunk);
            writer.write_all(chunk)?;
            total += n as u64;
        }

        let tag = mac.finalize().into_bytes();
        writer.write_all(&tag)?;
        writer.flush()?;
        Ok(total)
    }

    /// Decrypt `src` into `dst`.
    ///
    /// The HMAC tail is verified (constant-time) over the whole artifact
    /// before any plaintext is produced; artifacts below the minimum
    /// envelope size are rejected outright.
    pub fn decrypt_file(&self, src: &Path, dst: &Path) -> EncryptionResult<u64> {
        let len = std::fs::metadata(src)?.len();
        if len < MIN_ARTIFACT_LEN {
            return Err(EncryptionError::Truncated(len));
        }
        let body_len = len - MIN_ARTIFACT_LEN;

        // Pass one: authenticate IV || ciphertext.
        let mut reader = BufReader::new(File::open(src)?);
        let mut iv = [0u8; IV_LEN];
        reader.read_exact(&mut iv)?;

        let mut mac = HmacSha256::new_from_slice(&self.mac_key[..])
            .map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;
        mac.update(&iv);

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = body_len;
        while remaining > 0 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            reader.read_exact(&mut buf[..take])?;
            mac.update(&buf[..take]);
            remaining -= take as u64;
        }

        let mut tag = [0u8; MAC_LEN];
        reader.read_exact(&mut tag)?;
        mac.verify_slice(&tag)
            .map_err(|_| EncryptionError::AuthenticationFailed)?;

        // Pass two: decrypt the authenticated ciphertext.
        let mut reader = BufReader::new(File::open(src)?);
        reader.seek(SeekFrom::Start(IV_LEN as u64))?;
        let mut writer = BufWriter::new(File::create(dst)?);

        let mut cipher = Aes256Ctr::new_from_slices(&self.cipher_key[..], &iv)
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        let mut remaining = body_len;
        while remaining > 0 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            reader.read_exact(&mut buf[..take])?;
            cipher.apply_keystream(&mut buf[..take]);
            writer.write_all(&buf[..take])?;
            remaining -= take as u64;
        }
        writer.flush()?;
        Ok(body_len)
    }
}

fn derive_subkey(master: &[u8; 32], label: &[u8]) -> EncryptionResult<Zeroizing<[u8; 32]>> {
    let mut mac = HmacSha256::new_from_slice(master)
        .map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;
    mac.update(label);
    let digest = mac.finalize().into_bytes();
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    Ok(key)
}
