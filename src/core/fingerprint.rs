//! Content fingerprint of a media file.
//!
//! The fingerprint is the OpenSubtitles movie hash: the file size plus the
//! first and last 64 KiB read as little-endian 64-bit words, summed with
//! wrapping arithmetic. Files with the same size and the same head and tail
//! share a fingerprint whatever their middle content.

use crate::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes read at each end of the file.
pub const CHUNK_SIZE: u64 = 65536;

/// Smallest file that can be fingerprinted.
pub const MIN_FILE_SIZE: u64 = CHUNK_SIZE * 2;

/// Compute the 16-hex-digit fingerprint of a file.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    if size < MIN_FILE_SIZE {
        return Err(Error::FileTooSmall {
            path: path.to_path_buf(),
            size,
        });
    }

    let mut buffer = vec![0u8; CHUNK_SIZE as usize];
    let mut hash = size;

    file.read_exact(&mut buffer)?;
    hash = hash.wrapping_add(sum_words(&buffer));

    file.seek(SeekFrom::Start(size - CHUNK_SIZE))?;
    file.read_exact(&mut buffer)?;
    hash = hash.wrapping_add(sum_words(&buffer));

    Ok(format!("{:016x}", hash))
}

/// Wrapping sum of a buffer read as little-endian 64-bit words.
fn sum_words(buffer: &[u8]) -> u64 {
    buffer.chunks_exact(8).fold(0u64, |acc, word| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(word);
        acc.wrapping_add(i64::from_le_bytes(bytes) as u64)
    })
}
