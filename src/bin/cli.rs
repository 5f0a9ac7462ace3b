use std::path::PathBuf;

use clap::Parser;
use si_scanner::filter::FilterOptions;
use si_scanner::scanner::{Options, report_json, run, run_dump};

#[derive(Parser)]
#[command(name = "si-scanner", about = "Scan broadcast SI tables into a channel list")]
struct Opt {
    /// UDP socket to bind + listen (IPv4) for raw SI sections
    #[clap(long, default_value = "239.1.1.2:1234")]
    addr: String,

    /// Replay a capture file of raw sections instead of listening
    #[clap(long)]
    dump: Option<PathBuf>,

    /// Stop collecting after this many seconds
    #[clap(long, default_value_t = 60)]
    collect_secs: u64,

    /// Log CRC failures instead of discarding the corrupt section
    #[clap(long, default_value_t = false)]
    no_strict_crc: bool,

    /// Only keep channels from this bouquet (0 = any)
    #[clap(long, default_value_t = 0)]
    bouquet: u16,

    /// Acceptable region code, repeatable (none = any)
    #[clap(long)]
    region: Vec<u16>,

    /// Keep transports with a modulation system strictly below this value
    #[clap(long, default_value_t = 1)]
    max_modulation: u8,

    /// Include HD services
    #[clap(long, default_value_t = false)]
    hd: bool,

    /// Drop channels with a user number above this
    #[clap(long, default_value_t = 999)]
    max_user_number: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let filter = FilterOptions {
        bouquet_id: opt.bouquet,
        regions: opt.region.into_iter().collect(),
        max_modulation_system: opt.max_modulation,
        include_hd: opt.hd,
        max_user_number: opt.max_user_number,
    };
    let strict_crc = !opt.no_strict_crc;

    let channels = match opt.dump {
        Some(path) => run_dump(&path, strict_crc, &filter)?,
        None => {
            run(Options {
                addr: opt.addr.parse()?,
                strict_crc,
                collect_secs: opt.collect_secs,
                filter,
            })
            .await?
        }
    };

    println!("{}", report_json(&channels)?);
    Ok(())
}
