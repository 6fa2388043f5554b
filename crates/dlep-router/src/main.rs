// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DLEP Router CLI
//!
//! Command-line front-end for the `dlep` session engine: discovers (or is
//! pointed at) a radio modem, runs the session and logs everything the
//! modem reports. Restarts discovery whenever the modem goes away.
//!
//! # Usage
//!
//! ```bash
//! # Multicast discovery on the default interface
//! dlep-router
//!
//! # Discovery over a specific interface, custom heartbeat
//! dlep-router --interface wlan0 --heartbeat 10
//!
//! # Skip discovery: the modem's session address is known
//! dlep-router 10.0.0.1 854
//!
//! # IPv6 link-local modem (the interface supplies the scope id)
//! dlep-router --ipv6 --interface wlan0 fe80::210:2fff:fe03:4567
//! ```

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use dlep::{run_session, SessionConfig, SessionOutcome};

/// DLEP router daemon
#[derive(Parser, Debug)]
#[command(name = "dlep-router")]
#[command(about = "DLEP router daemon - discovers a radio modem and logs its destinations")]
#[command(version)]
struct Args {
    /// Network interface carrying the radio link
    #[arg(short, long)]
    interface: Option<String>,

    /// Router Heartbeat Interval in seconds
    #[arg(short = 'H', long, default_value = "30")]
    heartbeat: u32,

    /// Use IPv6 (default is IPv4)
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Modem session address; omit to run multicast discovery
    modem_addr: Option<String>,

    /// Modem session port (defaults to the well-known DLEP port 854)
    port: Option<u16>,
}

#[derive(Debug, Error)]
enum RouterError {
    #[error("modem address '{0}' is not a valid IP address")]
    AddressParse(String),

    #[error("modem address '{0}' does not match the selected {1} mode")]
    AddressFamily(String, &'static str),

    #[error("heartbeat interval must be at least 1 second")]
    ZeroHeartbeat,
}

/// The operator-supplied session target, if any.
fn parse_target(args: &Args) -> Result<Option<SocketAddr>, RouterError> {
    let Some(text) = &args.modem_addr else {
        return Ok(None);
    };

    let ip: IpAddr = text
        .parse()
        .map_err(|_| RouterError::AddressParse(text.clone()))?;

    match (ip, args.ipv6) {
        (IpAddr::V4(_), true) => Err(RouterError::AddressFamily(text.clone(), "IPv6")),
        (IpAddr::V6(_), false) => Err(RouterError::AddressFamily(text.clone(), "IPv4")),
        _ => Ok(Some(SocketAddr::new(
            ip,
            args.port.unwrap_or(dlep::config::DLEP_PORT),
        ))),
    }
}

fn session_config(args: &Args) -> Result<SessionConfig, RouterError> {
    if args.heartbeat == 0 {
        return Err(RouterError::ZeroHeartbeat);
    }

    let mut cfg = SessionConfig::new();
    cfg.target = parse_target(args)?;
    cfg.use_ipv6 = args.ipv6;
    cfg.interface = args.interface.clone();
    cfg.router_heartbeat_ms = args.heartbeat.saturating_mul(1000);
    Ok(cfg)
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over --log-level; the fmt subscriber also captures the
    // library's `log` records
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = match session_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "dlep-router {} starting ({} mode, heartbeat {} s)",
        dlep::VERSION,
        if cfg.use_ipv6 { "IPv6" } else { "IPv4" },
        args.heartbeat
    );

    loop {
        match run_session(&cfg) {
            SessionOutcome::Retryable(reason) => {
                tracing::warn!("{}; returning to discovery", reason);
            }
            SessionOutcome::Graceful => {
                tracing::info!("session closed gracefully, exiting");
                return ExitCode::SUCCESS;
            }
            SessionOutcome::Fatal(reason) => {
                tracing::error!("{}", reason);
                return ExitCode::FAILURE;
            }
        }
    }
}
