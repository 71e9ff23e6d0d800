//! Streaming SHA-1 digest of files.
//!
//! Used to compare a file with its decrypted copy after an encryption
//! round-trip. SHA-1 is kept for compatibility with digests recorded by
//! existing deployments; it is not used for anything security relevant here.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::{PkiError, Result};

/// Read buffer size used when the caller has no preference.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Length of a SHA-1 digest in bytes.
pub const SHA1_LEN: usize = 20;

/// SHA-1 of the file at `path`, read in chunks of `buffer_size` bytes.
///
/// The file is closed on every return path.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn sha1_file(path: impl AsRef<Path>, buffer_size: usize) -> Result<[u8; SHA1_LEN]> {
    let file = File::open(path.as_ref())?;
    let digest = sha1_reader(file, buffer_size)?;
    tracing::trace!(sha1 = %hex::encode(digest), "file digest");
    Ok(digest)
}

/// SHA-1 of everything `reader` yields until end of stream.
///
/// Only the bytes each read actually returned are hashed. Interrupted reads
/// are retried, any other read error is returned.
pub fn sha1_reader<R: Read>(mut reader: R, buffer_size: usize) -> Result<[u8; SHA1_LEN]> {
    if buffer_size == 0 {
        return Err(PkiError::InvalidInput(
            "digest buffer size must be positive".to_string(),
        ));
    }
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(hasher.finalize().into())
}
