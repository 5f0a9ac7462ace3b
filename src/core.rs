// src/core.rs
//! Collection control loop: feeds raw section bytes into the decoder until
//! the catalog is complete or the collection window closes, then runs the
//! selection pass.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use bytes::{Buf, BytesMut};
use log::{debug, info, warn};
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{Duration, Instant, timeout};

use crate::catalog::Catalog;
use crate::error::SiError;
use crate::filter::{ChannelRecord, FilterOptions, filter_data};
use crate::si::si_process;

pub struct Options {
    /// UDP socket delivering raw SI sections (multicast joined if needed).
    pub addr: SocketAddr,
    /// Reject sections that fail the CRC check instead of just logging.
    pub strict_crc: bool,
    /// Give up collecting after this long even if tables stay incomplete.
    pub collect_secs: u64,
    pub filter: FilterOptions,
}

/// Collects SI sections from the network, then selects channels.
///
/// The catalog left behind by an expired window may be partial; the
/// selection pass copes with that by dropping unresolvable channels.
pub async fn run(opts: Options) -> anyhow::Result<Vec<ChannelRecord>> {
    let socket = create_udp_socket(&opts.addr)?;
    let sock = UdpSocket::from_std(socket.into())?;

    let mut catalog = Catalog::default();
    let mut pending = BytesMut::with_capacity(65536);
    let mut datagram = [0u8; 8192];
    let deadline = Instant::now() + Duration::from_secs(opts.collect_secs);

    loop {
        let window = deadline.saturating_duration_since(Instant::now());
        if window.is_zero() {
            info!("collection window elapsed, selecting from what we have");
            break;
        }
        let n = match timeout(window, sock.recv(&mut datagram)).await {
            Ok(read) => read?,
            Err(_) => {
                info!("collection window elapsed, selecting from what we have");
                break;
            }
        };
        if n == 0 {
            continue;
        }
        pending.extend_from_slice(&datagram[..n]);
        drain_sections(&mut catalog, &mut pending, opts.strict_crc);

        if catalog.collection_complete() {
            info!(
                "catalog complete: {} networks, {} transports, {} bouquets",
                catalog.networks().len(),
                catalog.transports().len(),
                catalog.bouquets().len()
            );
            break;
        }
    }

    Ok(filter_data(&catalog, &opts.filter))
}

/// Replays a captured dump of raw back-to-back sections through the same
/// drain loop, for offline runs and feeds that were saved to disk.
pub fn run_dump(
    path: &Path,
    strict_crc: bool,
    filter: &FilterOptions,
) -> anyhow::Result<Vec<ChannelRecord>> {
    let raw = std::fs::read(path)?;
    let mut catalog = Catalog::default();
    let mut pending = BytesMut::from(&raw[..]);
    drain_sections(&mut catalog, &mut pending, strict_crc);
    if !pending.is_empty() {
        warn!(
            "{} trailing bytes in {} never formed a section",
            pending.len(),
            path.display()
        );
    }
    Ok(filter_data(&catalog, filter))
}

/// Consumes as many complete sections as `pending` holds, sliding the
/// buffer forward by exactly what `si_process` reports. Whatever is left
/// is the start of an incomplete section, kept for the next delivery.
fn drain_sections(catalog: &mut Catalog, pending: &mut BytesMut, strict_crc: bool) {
    loop {
        match si_process(catalog, &pending[..], strict_crc) {
            Ok(0) => break,
            Ok(consumed) => {
                debug!(
                    "consumed {consumed} byte section, {} left",
                    pending.len() - consumed
                );
                pending.advance(consumed);
            }
            Err(SiError::CrcMismatch { consumed }) => {
                warn!("discarding corrupt section of {consumed} bytes");
                pending.advance(consumed);
            }
            Err(err) => {
                warn!("section stream wedged: {err}");
                break;
            }
        }
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    ts_time: String,
    channel_count: usize,
    channels: &'a [ChannelRecord],
}

/// Final JSON report handed to stdout, shaped for a future database
/// writer.
pub fn report_json(channels: &[ChannelRecord]) -> anyhow::Result<String> {
    let rep = ReportJson {
        ts_time: chrono::Utc::now().to_rfc3339(),
        channel_count: channels.len(),
        channels,
    };
    Ok(serde_json::to_string_pretty(&rep)?)
}

/// Join multicast / bind unicast socket helper.
fn create_udp_socket(addr: &SocketAddr) -> anyhow::Result<Socket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => anyhow::bail!("only IPv4 is supported"),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&(*addr).into())?;

    if ip.is_multicast() {
        let iface = Ipv4Addr::UNSPECIFIED; // default interface
        socket.join_multicast_v4(&ip, &iface)?;
    }
    socket.set_nonblocking(true)?;
    Ok(socket)
}
