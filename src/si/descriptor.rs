// src/si/descriptor.rs
//! Generic descriptor-loop decoder.
//!
//! Descriptors are a tagged-union mini-protocol nested inside every table
//! body: `(id: u8, length: u8, payload)` repeated to the end of the block.
//! Which ids make sense depends on what entity the enclosing loop is
//! describing, so the decoder dispatches on `(id, target)` and skips any
//! pairing it does not recognize.

use log::{debug, trace, warn};

use crate::catalog::{Bouquet, Network, OpenTvChannel, Service, Transport};
use crate::cursor::{Cursor, ShortRead, bcd_digits};
use crate::error::SiError;

pub const DESC_NETWORK_NAME: u8 = 0x40;
pub const DESC_SATELLITE_DELIVERY: u8 = 0x43;
pub const DESC_BOUQUET_NAME: u8 = 0x47;
pub const DESC_SERVICE: u8 = 0x48;
pub const DESC_COUNTRY_AVAILABILITY: u8 = 0x49;
pub const DESC_OPENTV_CHANNELS: u8 = 0xb1;
pub const DESC_SERVICE_ALT_NAME: u8 = 0xc0;

/// Identity a BAT transport entry hands down to the 0xB1 decoder: every
/// channel record inside that descriptor targets a service on this
/// transport within this bouquet.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStub {
    pub bouquet_id: u16,
    pub original_network_id: u16,
    pub transport_id: u16,
}

/// What the current descriptor block is describing.
pub enum Target<'a> {
    Network(&'a mut Network),
    Bouquet(&'a mut Bouquet),
    Transport(&'a mut Transport),
    Service(&'a mut Service),
    /// BAT transport-entry block: channel records land on the bouquet,
    /// stamped with the stub's transport identity.
    Channels {
        bouquet: &'a mut Bouquet,
        stub: ChannelStub,
    },
}

fn truncated(_: ShortRead) -> SiError {
    SiError::TruncatedDescriptor
}

/// Decodes one descriptor block against `target`. A descriptor that lies
/// about its length aborts the whole block with `TruncatedDescriptor`.
pub fn decode_descriptors(block: &[u8], mut target: Target<'_>) -> Result<(), SiError> {
    let mut cur = Cursor::new(block);
    while cur.remaining() > 0 {
        if cur.remaining() < 2 {
            warn!(
                "descriptor loop too short for id+length at offset {} of {}",
                cur.pos(),
                block.len()
            );
            return Err(SiError::TruncatedDescriptor);
        }
        let id = cur.u8().map_err(truncated)?;
        let len = cur.u8().map_err(truncated)? as usize;
        trace!("descriptor {id:#04x}, {len} bytes");
        let body = cur.take(len).map_err(truncated)?;
        apply(id, body, &mut target)?;
    }
    Ok(())
}

fn apply(id: u8, body: &[u8], target: &mut Target<'_>) -> Result<(), SiError> {
    match (id, target) {
        (DESC_NETWORK_NAME, Target::Network(network)) => {
            network.name = Some(decode_string(body));
        }
        (DESC_BOUQUET_NAME, Target::Bouquet(bouquet)) => {
            bouquet.name = Some(decode_string(body));
        }
        (DESC_SERVICE, Target::Service(service)) => decode_service(body, service)?,
        (DESC_SERVICE_ALT_NAME, Target::Service(service)) => {
            service.alt_name = Some(decode_string(body));
        }
        (DESC_SATELLITE_DELIVERY, Target::Transport(transport)) => {
            decode_satellite_delivery(body, transport)?;
        }
        (DESC_OPENTV_CHANNELS, Target::Channels { bouquet, stub }) => {
            decode_opentv_channels(body, bouquet, *stub)?;
        }
        (DESC_COUNTRY_AVAILABILITY, _) => log_country_availability(body),
        // link / linkage / NVOD / timeshift / private-data / on-screen
        // message: recognized, intentionally ignored
        (0x41 | 0x4a | 0x4b | 0x4c | 0x5f | 0xb2, _) => {}
        (other, _) => {
            debug!("unhandled descriptor {other:#04x} ({} bytes), skipping", body.len());
        }
    }
    Ok(())
}

/// Name fields are raw length-prefixed byte strings; the copy is a plain
/// re-assignment, repeating a descriptor within one section just rewrites
/// the same value.
fn decode_string(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// 0x48: service type plus length-prefixed provider and name strings.
fn decode_service(body: &[u8], service: &mut Service) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let service_type = cur.u8().map_err(truncated)?;
    let provider_len = cur.u8().map_err(truncated)? as usize;
    let provider = cur.take(provider_len).map_err(truncated)?;
    let name_len = cur.u8().map_err(truncated)? as usize;
    let name = cur.take(name_len).map_err(truncated)?;

    service.service_type = service_type;
    service.provider = Some(decode_string(provider));
    service.name = Some(decode_string(name));
    trace!(
        "service descriptor: type {service_type:#04x} name {:?} provider {:?}",
        service.name, service.provider
    );
    Ok(())
}

/// 0x43: 11-byte fixed BCD/bitfield block carrying the physical tuning
/// parameters of one transponder.
fn decode_satellite_delivery(body: &[u8], transport: &mut Transport) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let frequency = cur.bcd(8).map_err(truncated)?;
    let orbital_position = cur.bcd(4).map_err(truncated)? as u16;
    let b = cur.u8().map_err(truncated)?;
    let west_east_flag = (b & 0x80) >> 7;
    let polarization = (b & 0x60) >> 5;
    let roll_off = (b & 0x18) >> 3;
    let modulation_system = (b & 0x04) >> 2;
    let modulation_type = b & 0x03;
    // 7 BCD digits of symbol rate, then the FEC code in the last nibble
    let tail = cur.take(4).map_err(truncated)?;
    let symbol_rate = bcd_digits(tail, 7);
    let fec = tail[3] & 0x0f;

    transport.frequency = frequency;
    transport.orbital_position = orbital_position;
    transport.west_east_flag = west_east_flag;
    transport.polarization = polarization;
    transport.roll_off = roll_off;
    transport.modulation_system = modulation_system;
    transport.modulation_type = modulation_type;
    transport.symbol_rate = symbol_rate;
    transport.fec = fec;
    trace!(
        "satellite delivery: freq {frequency} kHz symbol {symbol_rate} orbit {orbital_position} \
         pol {polarization} system {modulation_system} fec {fec}"
    );
    Ok(())
}

/// 0xB1 (proprietary): region word, then 9-byte channel records. This is
/// the actual source of playable channel entries; the BAT's own transport
/// loop is just the container that scopes them to a transport.
fn decode_opentv_channels(
    body: &[u8],
    bouquet: &mut Bouquet,
    stub: ChannelStub,
) -> Result<(), SiError> {
    let mut cur = Cursor::new(body);
    let region = cur.u16().map_err(truncated)?;
    while cur.remaining() > 0 {
        if cur.remaining() < 9 {
            warn!(
                "OpenTV channel record short at offset {} of {}",
                cur.pos(),
                body.len()
            );
            return Err(SiError::TruncatedDescriptor);
        }
        let service_id = cur.u16().map_err(truncated)?;
        let channel_type = cur.u8().map_err(truncated)?;
        let channel_number = cur.u16().map_err(truncated)?;
        let user_number = cur.u16().map_err(truncated)?;
        let flags = cur.u16().map_err(truncated)?;
        trace!(
            "OpenTV channel: service {service_id} type {channel_type} channel {channel_number} \
             user {user_number} flags {flags:#06x}"
        );
        bouquet.channels.push(OpenTvChannel {
            bouquet_id: stub.bouquet_id,
            original_network_id: stub.original_network_id,
            transport_id: stub.transport_id,
            service_id,
            region,
            channel_type,
            channel_number,
            user_number,
            flags,
        });
    }
    Ok(())
}

/// 0x49: decoded for the log only, no catalog effect.
fn log_country_availability(body: &[u8]) {
    let Some((&flags, rest)) = body.split_first() else {
        return;
    };
    let available = flags & 0x80 != 0;
    for code in rest.chunks_exact(3) {
        trace!(
            "country availability: {} available {available}",
            String::from_utf8_lossy(code)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    // frequency 1104000, orbit 28.2 east, pol 1, DVB-S, symbol 2750000, FEC 3
    const SAT_DELIVERY: [u8; 11] = [
        0x01, 0x10, 0x40, 0x00, 0x02, 0x82, 0x20, 0x27, 0x50, 0x00, 0x03,
    ];

    #[test]
    fn satellite_delivery_bcd_fields() {
        let mut t = Transport::default();
        decode_satellite_delivery(&SAT_DELIVERY, &mut t).unwrap();
        assert_eq!(t.frequency, 1_104_000);
        assert_eq!(t.orbital_position, 282);
        assert_eq!(t.west_east_flag, 0);
        assert_eq!(t.polarization, 1);
        assert_eq!(t.roll_off, 0);
        assert_eq!(t.modulation_system, 0);
        assert_eq!(t.modulation_type, 0);
        assert_eq!(t.symbol_rate, 2_750_000);
        assert_eq!(t.fec, 0x03);
    }

    #[test]
    fn satellite_delivery_too_short_is_truncated() {
        let mut t = Transport::default();
        assert_eq!(
            decode_satellite_delivery(&SAT_DELIVERY[..10], &mut t),
            Err(SiError::TruncatedDescriptor)
        );
    }

    #[test]
    fn network_name_descriptor_replaces_name() {
        let mut net = Network::default();
        let block = [0x40, 0x05, b'A', b's', b't', b'r', b'a'];
        decode_descriptors(&block, Target::Network(&mut net)).unwrap();
        assert_eq!(net.name.as_deref(), Some("Astra"));

        // re-assignment is idempotent, last one wins
        let block = [0x40, 0x03, b'S', b'k', b'y'];
        decode_descriptors(&block, Target::Network(&mut net)).unwrap();
        assert_eq!(net.name.as_deref(), Some("Sky"));
    }

    #[test]
    fn service_descriptor_sets_type_provider_and_name() {
        let mut svc = Service::default();
        let block = [
            0x48, 0x0a, 0x19, 0x03, b'B', b'S', b'B', 0x04, b'N', b'e', b'w', b's',
        ];
        decode_descriptors(&block, Target::Service(&mut svc)).unwrap();
        assert_eq!(svc.service_type, 0x19);
        assert_eq!(svc.provider.as_deref(), Some("BSB"));
        assert_eq!(svc.name.as_deref(), Some("News"));

        let block = [0xc0, 0x03, b'a', b'l', b't'];
        decode_descriptors(&block, Target::Service(&mut svc)).unwrap();
        assert_eq!(svc.alt_name.as_deref(), Some("alt"));
    }

    #[test]
    fn opentv_descriptor_appends_channels_to_bouquet() {
        let mut cat = Catalog::default();
        let bouquet = cat.bouquet_mut_or_create(0x110);
        let stub = ChannelStub {
            bouquet_id: 0x110,
            original_network_id: 2,
            transport_id: 10,
        };
        // region 3, two records
        let block = [
            0xb1, 0x14, 0x00, 0x03, //
            0x00, 0x64, 0x01, 0x00, 0x0a, 0x00, 0x65, 0x00, 0x00, //
            0x00, 0xc8, 0x01, 0x00, 0x0b, 0x00, 0x66, 0x80, 0x00,
        ];
        decode_descriptors(&block, Target::Channels { bouquet, stub }).unwrap();
        let bouquet = cat.bouquet(0x110).unwrap();
        assert_eq!(bouquet.channels.len(), 2);
        let ch = &bouquet.channels[0];
        assert_eq!(
            (ch.original_network_id, ch.transport_id, ch.service_id),
            (2, 10, 100)
        );
        assert_eq!(ch.region, 3);
        assert_eq!(ch.channel_number, 10);
        assert_eq!(ch.user_number, 101);
        assert_eq!(bouquet.channels[1].flags, 0x8000);
    }

    #[test]
    fn opentv_partial_record_aborts_block() {
        let mut cat = Catalog::default();
        let bouquet = cat.bouquet_mut_or_create(1);
        let stub = ChannelStub {
            bouquet_id: 1,
            original_network_id: 0,
            transport_id: 0,
        };
        let block = [0xb1, 0x06, 0x00, 0x03, 0x00, 0x64, 0x01, 0x00];
        assert_eq!(
            decode_descriptors(&block, Target::Channels { bouquet, stub }),
            Err(SiError::TruncatedDescriptor)
        );
    }

    #[test]
    fn overlong_descriptor_aborts_block() {
        let mut net = Network::default();
        let block = [0x40, 0x09, b'x'];
        assert_eq!(
            decode_descriptors(&block, Target::Network(&mut net)),
            Err(SiError::TruncatedDescriptor)
        );
    }

    #[test]
    fn unknown_and_ignored_descriptors_are_skipped_by_length() {
        let mut net = Network::default();
        // private-data specifier (ignored), unknown 0x99, then the name
        let block = [
            0x5f, 0x04, 0x00, 0x00, 0x00, 0x01, //
            0x99, 0x01, 0xff, //
            0x40, 0x02, b'O', b'K',
        ];
        decode_descriptors(&block, Target::Network(&mut net)).unwrap();
        assert_eq!(net.name.as_deref(), Some("OK"));
    }

    #[test]
    fn descriptor_against_wrong_target_is_skipped() {
        let mut t = Transport::default();
        // service descriptor aimed at a transport: no effect, no error
        let block = [0x48, 0x03, 0x01, 0x00, 0x00];
        decode_descriptors(&block, Target::Transport(&mut t)).unwrap();
        assert_eq!(t.frequency, 0);
    }
}
