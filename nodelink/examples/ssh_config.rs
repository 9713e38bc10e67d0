//! Configure an interface description over an SSH CLI session and read it
//! back from the running configuration.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ssh_config -- --host 192.0.2.10 --user admin --password secret \
//!     --interface ethernet1/1 --description uplink
//! ```
//!
//! Pass `--platform cisco_iosxr` for IOS XR, which commits the change.

use std::env;
use std::time::Duration;

use nodelink::session::{CliClient, HostKeyVerification, SessionConfig};
use nodelink::{Client, Credentials, Error, GetRequest, SetRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let creds = Credentials::remote(&args.host, &args.user, &args.password);
    let config = SessionConfig::default()
        .platform(&args.platform)
        .timeout(Duration::from_secs(60))
        .host_key_verification(HostKeyVerification::AcceptNew);

    println!("Connecting to {}...", args.host);
    let mut client = CliClient::connect(&creds, config).await?;
    println!("Logged in at level {:?}", client.privilege_level());

    let interface = format!("interface {}", args.interface);
    let request = SetRequest::cli(format!("description {}", args.description)).context(&interface);
    match client.set(request).await {
        Ok(()) => println!("Applied description to {}", args.interface),
        Err(Error::Cli(failure)) => {
            eprintln!("Rejected: {:?}", failure.rejected_input);
            eprintln!("{}", failure.clierror);
        }
        Err(e) => return Err(e.into()),
    }

    let description = client
        .get(
            GetRequest::cli(format!("show running-config {interface}"))
                .context(&interface)
                .value(r"/^description (.+)$/"),
        )
        .await?;
    println!("Running config: {description:?}");

    client.close().await?;
    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    user: String,
    password: String,
    platform: String,
    interface: String,
    description: String,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            host: "localhost".into(),
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            platform: "cisco_nxos".into(),
            interface: "ethernet1/1".into(),
            description: "configured by nodelink".into(),
        };

        let mut argv = env::args().skip(1);
        while let Some(flag) = argv.next() {
            let slot = match flag.as_str() {
                "--host" | "-h" => &mut args.host,
                "--user" | "-u" => &mut args.user,
                "--password" | "-P" => &mut args.password,
                "--platform" => &mut args.platform,
                "--interface" | "-i" => &mut args.interface,
                "--description" | "-d" => &mut args.description,
                "--help" => {
                    println!(
                        "USAGE: ssh_config --host HOST --user USER --password PASS \
                         [--platform NAME] [--interface NAME] [--description TEXT]"
                    );
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    continue;
                }
            };
            if let Some(value) = argv.next() {
                *slot = value;
            }
        }
        args
    }
}
