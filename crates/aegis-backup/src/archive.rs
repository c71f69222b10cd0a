//! Streaming gzip(tar) archive assembly.
//!
//! The archive is written straight to a file through a hashing tee, so the
//! content checksum covers the compressed byte stream and the backup never
//! materializes in memory. Entry layout: one JSON file per captured
//! resource under `<Kind>/<namespace>_<name>_<index>.json`, followed by a
//! final `manifest.json` entry.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};

use crate::error::{BackupError, Result};
use crate::manifest::{BackupManifest, MANIFEST_FILE_NAME};

const ENTRY_MODE: u32 = 0o644;

/// Write the archive for `manifest` to `dest`.
///
/// Returns the hex SHA-256 of the compressed stream and the number of
/// compressed bytes written. Blocking; callers run it on a blocking
/// thread.
pub fn build_archive(manifest: &BackupManifest, dest: &Path) -> Result<(String, u64)> {
    let file = File::create(dest)?;
    let tee = HashingWriter::new(file);

    let mtime = manifest.created_at.timestamp().max(0) as u64;
    let gz = GzBuilder::new()
        .comment(format!("Aegis backup {}", manifest.backup_id))
        .mtime(mtime as u32)
        .write(tee, Compression::default());
    let mut builder = tar::Builder::new(gz);

    for (index, resource) in manifest.resources.iter().enumerate() {
        let entry_path = format!(
            "{}/{}_{}_{}.json",
            resource.kind, resource.namespace, resource.name, index
        );
        let data = serde_json::to_vec_pretty(resource)?;
        append_entry(&mut builder, &entry_path, &data, mtime)?;
    }

    let manifest_bytes = serde_json::to_vec_pretty(manifest)?;
    append_entry(&mut builder, MANIFEST_FILE_NAME, &manifest_bytes, mtime)?;

    let gz = builder
        .into_inner()
        .map_err(|e| BackupError::Archive(e.to_string()))?;
    let mut tee = gz
        .finish()
        .map_err(|e| BackupError::Archive(e.to_string()))?;
    tee.flush()?;

    let (checksum, written) = tee.finalize();
    Ok((checksum, written))
}

fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(ENTRY_MODE);
    header.set_mtime(mtime);
    builder
        .append_data(&mut header, path, data)
        .map_err(|e| BackupError::Archive(format!("entry {}: {}", path, e)))
}

/// `io::Write` tee that feeds SHA-256 and counts bytes on the way through.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    fn finalize(self) -> (String, u64) {
        (hex::encode(self.hasher.finalize()), self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
