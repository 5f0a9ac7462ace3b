// src/si/bat.rs
//! Bouquet Association Table (tid 0x4A) decoder.
//!
//! The BAT's transport loop is informational framing: each entry just
//! scopes the proprietary 0xB1 channel-information descriptors to one
//! transport, and those descriptors are what actually yield channel
//! records.

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::cursor::Cursor;
use crate::error::SiError;
use crate::si::descriptor::{ChannelStub, Target, decode_descriptors};

/// Decodes one BAT section body (framing header and CRC already stripped).
pub fn decode(catalog: &mut Catalog, body: &[u8]) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let bouquet_id = cur.u16()?;
    let version = (cur.u8()? & 0x3e) >> 1;
    let section_number = cur.u8()?;
    let last_section = cur.u8()?;
    let desc_len = (cur.u16()? & 0x0fff) as usize;
    debug!("BAT: bouquet {bouquet_id} version {version} section {section_number}/{last_section}");

    let block = cur.take(desc_len)?;
    let bouquet = catalog.bouquet_mut_or_create(bouquet_id);
    if let Some(old) = bouquet.sections.observe(version, last_section) {
        warn!("BAT version for bouquet {bouquet_id} changed {old} -> {version} mid-collection");
    }
    if !bouquet.sections.mark_received(section_number) {
        debug!("BAT section {section_number} for bouquet {bouquet_id} already received");
        return Ok(());
    }
    decode_descriptors(block, Target::Bouquet(&mut *bouquet))?;

    let loop_len = cur.u16()? & 0x0fff;
    trace!("BAT: transport loop of {loop_len} bytes");
    while cur.remaining() > 0 {
        if cur.remaining() < 6 {
            warn!(
                "BAT transport loop short at offset {} of {}",
                cur.pos(),
                body.len()
            );
            return Err(SiError::TruncatedSection);
        }
        let transport_id = cur.u16()?;
        let original_network_id = cur.u16()?;
        let desc_len = (cur.u16()? & 0x0fff) as usize;
        trace!("BAT: transport {transport_id} original network {original_network_id}");
        let block = cur.take(desc_len)?;
        let stub = ChannelStub {
            bouquet_id,
            original_network_id,
            transport_id,
        };
        decode_descriptors(
            block,
            Target::Channels {
                bouquet: &mut *bouquet,
                stub,
            },
        )?;
    }

    Ok(())
}
