// src/si/nit.rs
//! Network Information Table (tid 0x40 actual / 0x41 other) decoder.
//!
//! Announces the transports (transponders) of one network; the satellite
//! delivery descriptor inside each transport entry is where the physical
//! tuning parameters come from.

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::cursor::Cursor;
use crate::error::SiError;
use crate::si::descriptor::{Target, decode_descriptors};

/// Decodes one NIT section body (framing header and CRC already stripped).
pub fn decode(catalog: &mut Catalog, body: &[u8]) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let network_id = cur.u16()?;
    let version = (cur.u8()? & 0x3e) >> 1;
    let section_number = cur.u8()?;
    let last_section = cur.u8()?;
    let desc_len = (cur.u16()? & 0x0fff) as usize;
    debug!("NIT: network {network_id} version {version} section {section_number}/{last_section}");

    let block = cur.take(desc_len)?;
    {
        let network = catalog.network_mut_or_create(network_id);
        if let Some(old) = network.sections.observe(version, last_section) {
            warn!("NIT version for network {network_id} changed {old} -> {version} mid-collection");
        }
        if !network.sections.mark_received(section_number) {
            debug!("NIT section {section_number} for network {network_id} already received");
            return Ok(());
        }
        decode_descriptors(block, Target::Network(network))?;
    }

    let loop_len = cur.u16()? & 0x0fff;
    trace!("NIT: transport loop of {loop_len} bytes");
    while cur.remaining() > 0 {
        if cur.remaining() < 6 {
            warn!(
                "NIT transport loop short at offset {} of {}",
                cur.pos(),
                body.len()
            );
            return Err(SiError::TruncatedSection);
        }
        let transport_id = cur.u16()?;
        let original_network_id = cur.u16()?;
        let desc_len = (cur.u16()? & 0x0fff) as usize;
        trace!("NIT: transport {transport_id} original network {original_network_id}");
        let block = cur.take(desc_len)?;
        let transport =
            catalog.transport_for_network(network_id, (original_network_id, transport_id));
        decode_descriptors(block, Target::Transport(transport))?;
    }

    Ok(())
}
