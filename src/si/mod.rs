// src/si/mod.rs
//! Service Information section framing, CRC gating and dispatch.

pub mod bat;
pub mod descriptor;
pub mod nit;
pub mod sdt;

use crc::{CRC_32_MPEG_2, Crc};
use log::{debug, info, trace, warn};

use crate::catalog::Catalog;
use crate::error::SiError;

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

pub const TID_NIT_ACTUAL: u8 = 0x40;
pub const TID_NIT_OTHER: u8 = 0x41;
pub const TID_SDT_ACTUAL: u8 = 0x42;
pub const TID_SDT_OTHER: u8 = 0x46;
pub const TID_BAT: u8 = 0x4a;

/// Validates and decodes at most one section from the front of `buffer`,
/// mutating `catalog` through the matching table decoder.
///
/// Returns the count of bytes consumed. `Ok(0)` means the buffer does not
/// yet hold a complete section; append more bytes and call again. Any
/// other count means that many leading bytes are dealt with and must not
/// be replayed, even if the section failed to decode internally (those
/// failures are logged and swallowed — the broadcaster repeats sections,
/// a later delivery may land on an untracked section number and succeed).
///
/// The only error surfaced is [`SiError::CrcMismatch`], raised in strict
/// mode for a well-framed but corrupt section; it carries the framed
/// length so the caller can discard exactly that much. With `strict_crc`
/// off a CRC failure is logged and the section is decoded anyway.
pub fn si_process(catalog: &mut Catalog, buffer: &[u8], strict_crc: bool) -> Result<usize, SiError> {
    if buffer.len() < 3 {
        trace!("si_process: only {} bytes buffered, need a header", buffer.len());
        return Ok(0);
    }

    let table_type = buffer[0];
    // covers everything after the 3-byte header, trailing CRC included
    let table_length = ((buffer[1] & 0x0f) as usize) << 8 | buffer[2] as usize;
    let total = table_length + 3;
    if total > buffer.len() {
        debug!(
            "si_process: section needs {total} bytes, buffer holds {}",
            buffer.len()
        );
        return Ok(0);
    }

    let residual = CRC_MPEG.checksum(&buffer[..total]);
    if residual != 0 {
        if strict_crc {
            return Err(SiError::CrcMismatch { consumed: total });
        }
        warn!("section failed CRC check (residual {residual:#010x}), accepting anyway");
    }

    if table_length < 4 {
        warn!("table {table_type:#04x} too short to carry a CRC, dropping {total} bytes");
        return Ok(total);
    }
    let body = &buffer[3..total - 4];

    let result = match table_type {
        TID_NIT_ACTUAL | TID_NIT_OTHER => nit::decode(catalog, body),
        TID_SDT_ACTUAL | TID_SDT_OTHER => sdt::decode(catalog, body),
        TID_BAT => bat::decode(catalog, body),
        other => {
            info!("valid but unhandled table {other:#04x} of {total} bytes");
            Ok(())
        }
    };
    if let Err(err) = result {
        warn!("table {table_type:#04x} section dropped: {err}");
    }

    Ok(total)
}
