//! Command-line surface, mirroring the original `getopt` flag set.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Unspecified,
    V4,
    V6,
}

#[derive(Parser, Debug)]
#[command(name = "callforge", about = "SIP user agent with real-time media")]
pub struct Cli {
    /// Force IPv4 only
    #[arg(short = '4', default_value_t = false)]
    pub ipv4_only: bool,

    /// Force IPv6 only
    #[arg(short = '6', default_value_t = false)]
    pub ipv6_only: bool,

    /// SIP User-Agent string
    #[arg(short = 'a')]
    pub user_agent: Option<String>,

    /// Run as daemon
    #[arg(short = 'd', default_value_t = false)]
    pub daemon: bool,

    /// Execute an interactive command (repeatable)
    #[arg(short = 'e')]
    pub exec: Vec<String>,

    /// Config directory
    #[arg(short = 'f')]
    pub config_dir: Option<PathBuf>,

    /// Pre-load module (repeatable)
    #[arg(short = 'm')]
    pub modules: Vec<String>,

    /// Audio files path
    #[arg(short = 'p')]
    pub audio_path: Option<PathBuf>,

    /// Enable SIP trace
    #[arg(short = 's', default_value_t = false)]
    pub sip_trace: bool,

    /// Quit after N seconds
    #[arg(short = 't')]
    pub quit_after: Option<u64>,

    /// Network interface
    #[arg(short = 'n')]
    pub net_interface: Option<String>,

    /// Extra UA parameters
    #[arg(short = 'u')]
    pub ua_params: Option<String>,

    /// Verbose debug
    #[arg(short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// Timestamps in logs
    #[arg(short = 'T', default_value_t = false)]
    pub timestamps: bool,

    /// Disable color
    #[arg(short = 'c', default_value_t = false)]
    pub no_color: bool,
}

impl Cli {
    pub fn address_family(&self) -> AddressFamily {
        match (self.ipv4_only, self.ipv6_only) {
            (true, false) => AddressFamily::V4,
            (false, true) => AddressFamily::V6,
            _ => AddressFamily::Unspecified,
        }
    }
}
