use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

/// SHA-256 of `content`, hex-encoded
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Copy `reader` into `writer`, returning the number of bytes copied and the
/// hex-encoded SHA-256 of everything that passed through.
pub fn copy_and_hash<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        written += n as u64;
    }

    Ok((written, hex::encode(hasher.finalize())))
}
