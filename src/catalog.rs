// src/catalog.rs
//! In-memory catalog of everything the SI tables describe: networks,
//! transports (transponders), services, bouquets and OpenTV channel
//! numbers, plus per-table-instance section tracking.
//!
//! Collections are insertion-ordered Vec arenas with a HashMap index on the
//! natural key; cross-references between entities are key tuples resolved
//! through [`Catalog`] lookups, never pointers. Get-or-create lookups are
//! the only mutation entry point and nothing is removed before process
//! exit.

use std::collections::HashMap;

/// `(original_network_id, transport_id)` — unique across all networks; the
/// SDT cross-references a transport by this pair alone.
pub type TransportKey = (u16, u16);

/// Multi-section bookkeeping for one logical table instance.
///
/// `populated` distinguishes "never seen" from "seen, zero sections fully
/// decoded yet"; once set, the version is expected to stay fixed for the
/// rest of the collection run.
#[derive(Debug, Clone, Default)]
pub struct SectionTracking {
    version: u8,
    last_section: u8,
    received: [u64; 4],
    populated: bool,
}

impl SectionTracking {
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn last_section(&self) -> u8 {
        self.last_section
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Records the header of an incoming section. On the first call this
    /// adopts `version`/`last_section` and marks the instance populated.
    /// A later call with a different version adopts the new numbers but
    /// keeps the received bitmap intact (broadcast versions are not
    /// expected to change mid-collection; the caller logs the returned old
    /// version as a warning).
    pub fn observe(&mut self, version: u8, last_section: u8) -> Option<u8> {
        if !self.populated {
            self.version = version;
            self.last_section = last_section;
            self.populated = true;
            return None;
        }
        if self.version != version {
            let old = self.version;
            self.version = version;
            self.last_section = last_section;
            return Some(old);
        }
        None
    }

    pub fn is_received(&self, section: u8) -> bool {
        self.received[usize::from(section) / 64] & (1 << (usize::from(section) % 64)) != 0
    }

    /// Marks `section` received; returns false if it already was.
    pub fn mark_received(&mut self, section: u8) -> bool {
        if self.is_received(section) {
            return false;
        }
        self.received[usize::from(section) / 64] |= 1 << (usize::from(section) % 64);
        true
    }

    /// True once every section `0..=last_section` has been received.
    pub fn complete(&self) -> bool {
        self.populated && (0..=self.last_section).all(|s| self.is_received(s))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    pub network_id: u16,
    pub name: Option<String>,
    /// NIT tracker for this network.
    pub sections: SectionTracking,
    /// Owned transports in NIT announcement order.
    pub transports: Vec<TransportKey>,
}

#[derive(Debug, Clone, Default)]
pub struct Transport {
    pub original_network_id: u16,
    pub transport_id: u16,
    /// SDT tracker for this transport; populated only once its own SDT
    /// arrives, distinct from the owning network's NIT tracker.
    pub sections: SectionTracking,
    services: Vec<Service>,
    service_index: HashMap<u16, usize>,

    // Delivery-system parameters from the satellite delivery descriptor.
    pub modulation_system: u8,
    pub modulation_type: u8,
    /// kHz
    pub frequency: u32,
    pub symbol_rate: u32,
    pub polarization: u8,
    pub fec: u8,
    pub roll_off: u8,
    /// Tenths of a degree.
    pub orbital_position: u16,
    pub west_east_flag: u8,
}

impl Transport {
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, service_id: u16) -> Option<&Service> {
        self.service_index.get(&service_id).map(|&i| &self.services[i])
    }

    pub fn service_entry(&mut self, service_id: u16) -> &mut Service {
        let idx = *self.service_index.entry(service_id).or_insert_with(|| {
            self.services.push(Service {
                service_id,
                ..Service::default()
            });
            self.services.len() - 1
        });
        &mut self.services[idx]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Service {
    pub service_id: u16,
    /// 3-bit running status.
    pub running: u8,
    pub free_ca: bool,
    /// Broadcast service type code.
    pub service_type: u8,
    pub name: Option<String>,
    /// Hidden / display-override name.
    pub alt_name: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Bouquet {
    pub bouquet_id: u16,
    pub name: Option<String>,
    /// BAT tracker for this bouquet.
    pub sections: SectionTracking,
    /// Channel-number records, in descriptor order.
    pub channels: Vec<OpenTvChannel>,
}

/// One provider channel-number mapping. Identifies its target service by
/// key only; the transport/service may arrive after this record does, so
/// the reference is resolved at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTvChannel {
    pub bouquet_id: u16,
    pub original_network_id: u16,
    pub transport_id: u16,
    pub service_id: u16,
    pub region: u16,
    pub channel_type: u8,
    pub channel_number: u16,
    pub user_number: u16,
    pub flags: u16,
}

#[derive(Debug, Default)]
pub struct Catalog {
    networks: Vec<Network>,
    network_index: HashMap<u16, usize>,
    transports: Vec<Transport>,
    transport_index: HashMap<TransportKey, usize>,
    bouquets: Vec<Bouquet>,
    bouquet_index: HashMap<u16, usize>,
}

impl Catalog {
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn network(&self, network_id: u16) -> Option<&Network> {
        self.network_index.get(&network_id).map(|&i| &self.networks[i])
    }

    pub fn network_mut_or_create(&mut self, network_id: u16) -> &mut Network {
        let idx = *self.network_index.entry(network_id).or_insert_with(|| {
            self.networks.push(Network {
                network_id,
                ..Network::default()
            });
            self.networks.len() - 1
        });
        &mut self.networks[idx]
    }

    pub fn transports(&self) -> &[Transport] {
        &self.transports
    }

    pub fn transport(&self, key: TransportKey) -> Option<&Transport> {
        self.transport_index.get(&key).map(|&i| &self.transports[i])
    }

    pub fn transport_mut(&mut self, key: TransportKey) -> Option<&mut Transport> {
        match self.transport_index.get(&key) {
            Some(&i) => Some(&mut self.transports[i]),
            None => None,
        }
    }

    /// Get-or-create a transport, attaching it to `network_id`'s transport
    /// list when newly created.
    pub fn transport_for_network(&mut self, network_id: u16, key: TransportKey) -> &mut Transport {
        if !self.transport_index.contains_key(&key) {
            self.transports.push(Transport {
                original_network_id: key.0,
                transport_id: key.1,
                ..Transport::default()
            });
            self.transport_index.insert(key, self.transports.len() - 1);
            if let Some(&net) = self.network_index.get(&network_id) {
                self.networks[net].transports.push(key);
            }
        }
        let idx = self.transport_index[&key];
        &mut self.transports[idx]
    }

    pub fn bouquets(&self) -> &[Bouquet] {
        &self.bouquets
    }

    pub fn bouquet(&self, bouquet_id: u16) -> Option<&Bouquet> {
        self.bouquet_index.get(&bouquet_id).map(|&i| &self.bouquets[i])
    }

    pub fn bouquet_mut_or_create(&mut self, bouquet_id: u16) -> &mut Bouquet {
        let idx = *self.bouquet_index.entry(bouquet_id).or_insert_with(|| {
            self.bouquets.push(Bouquet {
                bouquet_id,
                ..Bouquet::default()
            });
            self.bouquets.len() - 1
        });
        &mut self.bouquets[idx]
    }

    /// NIT completeness for one network.
    pub fn network_complete(&self, network_id: u16) -> bool {
        self.network(network_id)
            .is_some_and(|n| n.sections.complete())
    }

    /// SDT completeness across all of a network's transports: every child
    /// must have seen its own SDT and have all its sections.
    pub fn network_transports_complete(&self, network_id: u16) -> bool {
        let Some(network) = self.network(network_id) else {
            return false;
        };
        network.transports.iter().all(|&key| {
            self.transport(key)
                .is_some_and(|t| t.sections.is_populated() && t.sections.complete())
        })
    }

    /// BAT completeness for one bouquet.
    pub fn bouquet_complete(&self, bouquet_id: u16) -> bool {
        self.bouquet(bouquet_id)
            .is_some_and(|b| b.sections.complete())
    }

    /// True once at least one network and one bouquet exist and every
    /// table family the catalog knows about is fully received. Polled by
    /// the collection control loop to decide when to stop.
    pub fn collection_complete(&self) -> bool {
        !self.networks.is_empty()
            && !self.bouquets.is_empty()
            && self.networks.iter().all(|n| {
                n.sections.complete() && self.network_transports_complete(n.network_id)
            })
            && self.bouquets.iter().all(|b| b.sections.complete())
    }
}
