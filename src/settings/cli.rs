// SPDX-License-Identifier: GPL-3.0-or-later
use std::net::IpAddr;

use structopt::clap::AppSettings;
use structopt::StructOpt;

/// Command-line configuration. There is no config-file layer: every knob
/// here has a sensible default and the whole set is small enough that CLI
/// flags plus environment overrides (handled by `structopt`'s `env`
/// attribute) are enough.
#[derive(Clone, Debug, StructOpt)]
#[structopt(setting(AppSettings::DeriveDisplayOrder))]
pub struct Args {
    /// Name of the TUN interface to read painted packets from.
    #[structopt(short, long, default_value = "canvas", env = "CANVAS_INTERFACE")]
    pub interface: String,

    /// Use the batched io_uring ingress path instead of blocking reads.
    /// Only available on Linux, and only when this binary was built with
    /// the `io_uring` feature.
    #[structopt(short = "u", long)]
    pub io_uring: bool,

    /// The IP address the streaming server should listen on.
    #[structopt(
        short = "l",
        long = "listen-address",
        default_value = "0.0.0.0",
        env = "CANVAS_LISTEN_ADDRESS"
    )]
    pub listen_address: IpAddr,

    /// The port number to bind the streaming server to.
    #[structopt(
        short = "p",
        long = "listen-port",
        default_value = "9090",
        env = "CANVAS_LISTEN_PORT"
    )]
    pub listen_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let args = Args::from_iter(std::iter::once("canvas-v6"));
        assert_eq!(args.interface, "canvas");
        assert!(!args.io_uring);
        assert_eq!(args.listen_port, 9090);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::from_iter(
            ["canvas-v6", "-i", "tun7", "-u", "-p", "8080"].iter(),
        );
        assert_eq!(args.interface, "tun7");
        assert!(args.io_uring);
        assert_eq!(args.listen_port, 8080);
    }
}
