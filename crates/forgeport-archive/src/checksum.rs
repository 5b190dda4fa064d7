use forgeport_core::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Calculates SHA256 checksum of a file.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculates SHA256 checksum of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
