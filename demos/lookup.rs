//! Look up callsigns or prefixes from the command line.
//!
//! Usage:
//! ```text
//! QRZ_USERNAME=your_username QRZ_PASSWORD=your_password cargo run --example lookup -- qrz AA7BQ
//! HAMNUT_URL=https://api.hamnut.example/v1/prefix cargo run --example lookup -- hamnut K1
//! ```
//!
//! A provider whose environment is not set is left disabled, which turns
//! every lookup into a pass-through.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use callsign_lookup::{qrz, LookupConfig, LookupRecord, Logger, Provider, ProviderFactory};

fn qrz_config() -> LookupConfig {
    match (env::var("QRZ_USERNAME"), env::var("QRZ_PASSWORD")) {
        (Ok(username), Ok(password)) => {
            let url = env::var("QRZ_URL").unwrap_or_else(|_| qrz::DEFAULT_BASE_URL.to_string());
            LookupConfig::enabled(url).with_credentials(username, password)
        }
        _ => LookupConfig::default(),
    }
}

fn hamnut_config() -> LookupConfig {
    match env::var("HAMNUT_URL") {
        Ok(url) => LookupConfig::enabled(url),
        Err(_) => LookupConfig::default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <hamnut|qrz> <identifier>...", args[0]);
        eprintln!("Example: {} qrz AA7BQ W1AW", args[0]);
        std::process::exit(1);
    }

    let mut configs = HashMap::new();
    configs.insert("hamnut".to_string(), hamnut_config());
    configs.insert("qrz".to_string(), qrz_config());

    let factory = ProviderFactory::new(Logger::current(), Arc::new(configs));
    let provider = factory.new_provider(&args[1])?;

    if let Err(e) = provider.initialize().await {
        // A failed login leaves the provider usable in pass-through mode
        eprintln!("Initialization error: {}", e);
    }

    for identifier in &args[2..] {
        match provider.lookup(identifier).await {
            Ok(LookupRecord::Country(country)) => {
                println!("{}: {} ({})", identifier, country.name, country.country_code);
                println!("  Continent: {}", country.continent);
                println!("  CQ zone: {}  ITU zone: {}", country.cq_zone, country.itu_zone);
                println!("  UTC offset: {}", country.time_offset);
            }
            Ok(LookupRecord::Station(station)) => {
                println!("{}: {}", station.call, station.name);
                println!("  Address: {}", station.address);
                println!("  Grid: {}  DXCC: {}", station.gridsquare, station.dxcc);
            }
            Err(e) if e.is_network_error() => eprintln!("{}: network error, try again: {}", identifier, e),
            Err(e) => eprintln!("{}: {}", identifier, e),
        }
    }

    Ok(())
}
