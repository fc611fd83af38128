//! Archive format adapters.
//!
//! Adapters normalize different archive formats into a common interface
//! for the extraction driver.

mod sevenz_adapter;
mod zip_adapter;

pub use sevenz_adapter::SevenZAdapter;
pub use zip_adapter::ZipAdapter;

use std::io::{Read, Write};

use crate::error::Error;

/// Copy at most `limit` bytes from `reader` to `writer`.
///
/// Returns the number of bytes copied. Callers read one more byte from the reader afterwards
/// to tell a natural EOF from a truncated copy.
pub fn copy_limited<R: Read + ?Sized, W: Write>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> Result<u64, Error> {
    let mut total = 0u64;
    let mut buf = [0u8; 8192];

    loop {
        let remaining = limit.saturating_sub(total);
        if remaining == 0 {
            break;
        }

        let to_read = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = reader.read(&mut buf[..to_read])?;
        if n == 0 {
            break;
        }

        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}
