// src/si/sdt.rs
//! Service Description Table (tid 0x42 actual / 0x46 other) decoder.
//!
//! Describes the services carried on one transport. The transport must
//! already be known from a NIT; an SDT for an unannounced transport is
//! dropped whole.

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::cursor::Cursor;
use crate::error::SiError;
use crate::si::descriptor::{Target, decode_descriptors};

/// Decodes one SDT section body (framing header and CRC already stripped).
pub fn decode(catalog: &mut Catalog, body: &[u8]) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let transport_id = cur.u16()?;
    let version = (cur.u8()? & 0x3e) >> 1;
    let section_number = cur.u8()?;
    let last_section = cur.u8()?;
    let original_network_id = cur.u16()?;
    cur.skip(1)?; // reserved
    debug!(
        "SDT: transport {transport_id} original network {original_network_id} \
         version {version} section {section_number}/{last_section}"
    );

    let transport = catalog
        .transport_mut((original_network_id, transport_id))
        .ok_or(SiError::UnknownTransport {
            original_network_id,
            transport_id,
        })?;
    if let Some(old) = transport.sections.observe(version, last_section) {
        warn!("SDT version for transport {transport_id} changed {old} -> {version} mid-collection");
    }
    if !transport.sections.mark_received(section_number) {
        debug!("SDT section {section_number} for transport {transport_id} already received");
        return Ok(());
    }

    while cur.remaining() > 0 {
        if cur.remaining() < 5 {
            warn!(
                "SDT service loop short at offset {} of {}",
                cur.pos(),
                body.len()
            );
            return Err(SiError::TruncatedSection);
        }
        let service_id = cur.u16()?;
        cur.skip(1)?; // EIT schedule flags
        let b = cur.u8()?;
        let running = (b & 0xe0) >> 5;
        let free_ca = b & 0x10 != 0;
        let desc_len = ((b & 0x0f) as usize) << 8 | cur.u8()? as usize;
        trace!("SDT: service {service_id} running {running} free_ca {free_ca}");
        let block = cur.take(desc_len)?;

        let service = transport.service_entry(service_id);
        service.running = running;
        service.free_ca = free_ca;
        decode_descriptors(block, Target::Service(service))?;
    }

    Ok(())
}
