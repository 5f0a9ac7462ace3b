// src/filter.rs
//! Selection engine: cross-references every bouquet channel against its
//! transport and service and applies the tuning policy, yielding the final
//! deduplicated channel list.
//!
//! Every drop has its own diagnostic but none of them aborts the pass;
//! this is a filter over a possibly partial catalog, not a validator.

use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use crate::catalog::Catalog;

/// Ku-band hardware tuning range, kHz.
pub const KU_BAND_MIN_KHZ: u32 = 1_000_000;
pub const KU_BAND_MAX_KHZ: u32 = 1_400_000;

/// Television / audio / advanced-codec service types worth listing.
const SELECTABLE_SERVICE_TYPES: [u8; 5] = [1, 2, 4, 5, 25];
const SERVICE_TYPE_HD: u8 = 25;

#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Only this bouquet; 0 = any.
    pub bouquet_id: u16,
    /// Acceptable region codes; empty = any.
    pub regions: HashSet<u16>,
    /// Keep transports whose modulation system is strictly below this
    /// (1 keeps DVB-S only, 2 keeps DVB-S and DVB-S2).
    pub max_modulation_system: u8,
    /// Admit HD (type 25) services.
    pub include_hd: bool,
    /// Drop channels whose user number exceeds this.
    pub max_user_number: u16,
}

/// One tunable channel, fully resolved. The sole record handed to any
/// downstream printing or persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub transport_id: u16,
    pub original_network_id: u16,
    /// kHz
    pub frequency: u32,
    pub symbol_rate: u32,
    pub polarization: u8,
    pub modulation_system: u8,
    pub roll_off: u8,
    pub service_id: u16,
    pub user_number: u16,
    pub name: String,
}

/// Walks every bouquet channel in catalog order and keeps the ones that
/// resolve and pass the policy in `opts`.
pub fn filter_data(catalog: &Catalog, opts: &FilterOptions) -> Vec<ChannelRecord> {
    let mut out = Vec::new();

    for bouquet in catalog.bouquets() {
        if opts.bouquet_id != 0 && bouquet.bouquet_id != opts.bouquet_id {
            continue;
        }
        for ch in &bouquet.channels {
            if !opts.regions.is_empty() && !opts.regions.contains(&ch.region) {
                debug!("channel {}: region {} not selected", ch.user_number, ch.region);
                continue;
            }
            let key = (ch.original_network_id, ch.transport_id);
            let Some(transport) = catalog.transport(key) else {
                debug!(
                    "channel {}: dangling reference to transport {}/{}",
                    ch.user_number, ch.original_network_id, ch.transport_id
                );
                continue;
            };
            if transport.modulation_system >= opts.max_modulation_system {
                debug!(
                    "channel {}: modulation system {} over limit",
                    ch.user_number, transport.modulation_system
                );
                continue;
            }
            if transport.frequency < KU_BAND_MIN_KHZ || transport.frequency > KU_BAND_MAX_KHZ {
                debug!(
                    "channel {}: frequency {} kHz outside Ku band",
                    ch.user_number, transport.frequency
                );
                continue;
            }
            let Some(service) = transport.service(ch.service_id) else {
                debug!(
                    "channel {}: dangling reference to service {}",
                    ch.user_number, ch.service_id
                );
                continue;
            };
            if !SELECTABLE_SERVICE_TYPES.contains(&service.service_type) {
                debug!(
                    "channel {}: service type {} not selectable",
                    ch.user_number, service.service_type
                );
                continue;
            }
            if service.service_type == SERVICE_TYPE_HD && !opts.include_hd {
                debug!("channel {}: HD excluded", ch.user_number);
                continue;
            }
            if ch.user_number > opts.max_user_number {
                debug!("channel {}: over user number limit", ch.user_number);
                continue;
            }

            out.push(ChannelRecord {
                transport_id: ch.transport_id,
                original_network_id: ch.original_network_id,
                frequency: transport.frequency,
                symbol_rate: transport.symbol_rate,
                polarization: transport.polarization,
                modulation_system: transport.modulation_system,
                roll_off: transport.roll_off,
                service_id: ch.service_id,
                user_number: ch.user_number,
                name: service.name.clone().unwrap_or_default(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OpenTvChannel;

    fn sample_catalog() -> Catalog {
        let mut cat = Catalog::default();
        cat.network_mut_or_create(1);
        let t = cat.transport_for_network(1, (2, 10));
        t.frequency = 1_150_000;
        t.symbol_rate = 2_750_000;
        t.modulation_system = 0;
        let svc = t.service_entry(100);
        svc.service_type = 1;
        svc.name = Some("News".into());
        cat.bouquet_mut_or_create(0x110).channels.push(OpenTvChannel {
            bouquet_id: 0x110,
            original_network_id: 2,
            transport_id: 10,
            service_id: 100,
            region: 0,
            channel_type: 1,
            channel_number: 10,
            user_number: 5,
            flags: 0,
        });
        cat
    }

    fn open_opts() -> FilterOptions {
        FilterOptions {
            bouquet_id: 0,
            regions: HashSet::new(),
            max_modulation_system: 1,
            include_hd: false,
            max_user_number: 10,
        }
    }

    #[test]
    fn resolves_a_single_channel() {
        let cat = sample_catalog();
        let out = filter_data(&cat, &open_opts());
        assert_eq!(out.len(), 1);
        let ch = &out[0];
        assert_eq!(ch.transport_id, 10);
        assert_eq!(ch.original_network_id, 2);
        assert_eq!(ch.frequency, 1_150_000);
        assert_eq!(ch.symbol_rate, 2_750_000);
        assert_eq!(ch.service_id, 100);
        assert_eq!(ch.user_number, 5);
        assert_eq!(ch.name, "News");
    }

    #[test]
    fn user_number_limit_is_inclusive() {
        let cat = sample_catalog();
        let mut opts = open_opts();
        opts.max_user_number = 5;
        assert_eq!(filter_data(&cat, &opts).len(), 1);
        opts.max_user_number = 4;
        assert!(filter_data(&cat, &opts).is_empty());
    }

    #[test]
    fn modulation_gate_is_strictly_less_than() {
        let cat = sample_catalog();
        let mut opts = open_opts();
        opts.max_modulation_system = 0; // excludes system 0 itself
        assert!(filter_data(&cat, &opts).is_empty());
    }

    #[test]
    fn out_of_ku_band_is_always_excluded() {
        let mut cat = sample_catalog();
        cat.transport_mut((2, 10)).unwrap().frequency = 900_000;
        assert!(filter_data(&cat, &open_opts()).is_empty());
    }

    #[test]
    fn hd_services_need_the_hd_flag() {
        let mut cat = sample_catalog();
        cat.transport_mut((2, 10))
            .unwrap()
            .service_entry(100)
            .service_type = 25;
        let mut opts = open_opts();
        assert!(filter_data(&cat, &opts).is_empty());
        opts.include_hd = true;
        assert_eq!(filter_data(&cat, &opts).len(), 1);
    }

    #[test]
    fn unlisted_service_types_are_dropped() {
        let mut cat = sample_catalog();
        cat.transport_mut((2, 10))
            .unwrap()
            .service_entry(100)
            .service_type = 12;
        assert!(filter_data(&cat, &open_opts()).is_empty());
    }

    #[test]
    fn region_filter_matches_membership() {
        let cat = sample_catalog();
        let mut opts = open_opts();
        opts.regions = [7].into_iter().collect();
        assert!(filter_data(&cat, &opts).is_empty());
        opts.regions = [7, 0].into_iter().collect();
        assert_eq!(filter_data(&cat, &opts).len(), 1);
    }

    #[test]
    fn bouquet_filter_selects_one_bouquet() {
        let cat = sample_catalog();
        let mut opts = open_opts();
        opts.bouquet_id = 0x110;
        assert_eq!(filter_data(&cat, &opts).len(), 1);
        opts.bouquet_id = 0x111;
        assert!(filter_data(&cat, &opts).is_empty());
    }

    #[test]
    fn dangling_references_degrade_gracefully() {
        let mut cat = sample_catalog();
        // channel pointing at a transport nobody announced
        cat.bouquet_mut_or_create(0x110).channels.push(OpenTvChannel {
            bouquet_id: 0x110,
            original_network_id: 9,
            transport_id: 99,
            service_id: 1,
            region: 0,
            channel_type: 1,
            channel_number: 11,
            user_number: 6,
            flags: 0,
        });
        // and one pointing at a missing service on a real transport
        cat.bouquet_mut_or_create(0x110).channels.push(OpenTvChannel {
            bouquet_id: 0x110,
            original_network_id: 2,
            transport_id: 10,
            service_id: 555,
            region: 0,
            channel_type: 1,
            channel_number: 12,
            user_number: 7,
            flags: 0,
        });
        let out = filter_data(&cat, &open_opts());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].service_id, 100);
    }
}
