//! Connect through whichever driver the device answers and report its
//! software version.
//!
//! # Usage
//!
//! Against a remote device:
//! ```bash
//! cargo run --example show_version -- --host 192.0.2.10 --user admin --password secret
//! ```
//!
//! Using a profile from `/etc/nodelink.yaml` or `~/.nodelink.yaml`:
//! ```bash
//! cargo run --example show_version -- --env lab
//! ```
//!
//! On the device itself (local NX-API socket), pass no host at all.

use std::env;

use nodelink::{
    Client, ClientRegistry, Credentials, Environments, ErrorKind, GetRequest, Output,
    register_builtin_drivers,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows every request on the wire
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let registry = ClientRegistry::global();
    register_builtin_drivers(registry);

    let mut client = match (&args.env, &args.host) {
        (Some(name), _) => {
            let environments = Environments::load_default()?;
            registry.create_from_environment(&environments, Some(name.as_str())).await?
        }
        (None, Some(host)) => {
            let creds = Credentials::remote(host, &args.user, args.password.as_deref().unwrap_or(""));
            registry.create(&creds).await?
        }
        (None, None) => registry.create(&Credentials::local()).await?,
    };

    println!(
        "Connected to {} ({} driver, platform {})",
        client.address().unwrap_or("local device"),
        client.driver_name(),
        client.platform()
    );

    let structured = GetRequest::structured("show version").value("nxos_ver_str");
    let version = match client.get(structured).await {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::RequestNotSupported => {
            // No structured output: scrape the text instead.
            client
                .get(GetRequest::cli("show version").value(r"/[Vv]ersion\s+(\S+)/"))
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    match version {
        Output::Structured(value) => println!("Version: {value}"),
        Output::Values(values) => println!("Version: {}", values.join(", ")),
        Output::Empty => println!("Version not found in output"),
        other => println!("{other:?}"),
    }

    Ok(())
}

/// Simple argument parser
struct Args {
    host: Option<String>,
    user: String,
    password: Option<String>,
    env: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            host: None,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            env: None,
        };

        let mut argv = env::args().skip(1);
        while let Some(flag) = argv.next() {
            match flag.as_str() {
                "--host" | "-h" => args.host = argv.next(),
                "--user" | "-u" => args.user = argv.next().unwrap_or(args.user),
                "--password" | "-P" => args.password = argv.next(),
                "--env" | "-e" => args.env = argv.next(),
                "--help" => {
                    println!("USAGE: show_version [--host HOST --user USER --password PASS] [--env NAME]");
                    std::process::exit(0);
                }
                other => eprintln!("Unknown argument: {other}"),
            }
        }
        args
    }
}
