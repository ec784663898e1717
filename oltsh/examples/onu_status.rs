//! Print ONU health per PON port, plus any unconfigured ONUs.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example onu_status -- --host 10.0.0.2 --user admin --password secret
//! ```

use std::env;
use std::time::Duration;

use oltsh::OltClientBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let client = OltClientBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .command_timeout(Duration::from_secs(args.timeout))
        .build()?;

    println!("{:<10} {:>10} {:>8} {:>8}  STATUS", "PORT", "REGISTERED", "ONLINE", "OFFLINE");
    for port in client.get_onu_state().await? {
        println!(
            "{:<10} {:>10} {:>8} {:>8}  {}",
            port.port, port.registered, port.online, port.offline, port.status
        );
    }

    let unconfigured = client.get_unconfigured_onus().await?;
    if !unconfigured.is_empty() {
        println!("\nUnconfigured ONUs:");
        for onu in unconfigured {
            println!("  {:<20} {:<16} {}", onu.interface, onu.serial, onu.state);
        }
    }

    client.disconnect().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 23,
            user: "admin".to_string(),
            password: env::var("OLT_PASSWORD").unwrap_or_default(),
            timeout: 60,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(23),
                ("--user" | "-u", Some(v)) => parsed.user = v,
                ("--password" | "-P", Some(v)) => parsed.password = v,
                ("--timeout" | "-t", Some(v)) => parsed.timeout = v.parse().unwrap_or(60),
                ("--help", _) => {
                    Self::print_help();
                    std::process::exit(0);
                }
                (other, _) => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"oltsh onu_status example

USAGE:
    cargo run --example onu_status -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        OLT address [default: localhost]
    -p, --port <PORT>        Telnet port [default: 23]
    -u, --user <USER>        Username [default: admin]
    -P, --password <PASS>    Password [default: $OLT_PASSWORD]
    -t, --timeout <SECS>     Command timeout [default: 60]
    --help                   Print this help message"#
        );
    }
}
