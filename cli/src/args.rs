//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

/// Import an OpenVPN client configuration
#[derive(Parser, Debug, PartialEq)]
#[command(name = "ovpn-import", version, about)]
pub struct Args {
    /// The .ovpn file to import
    pub file: PathBuf,

    /// Connection name (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// Username for password-authenticated profiles
    #[arg(long)]
    pub username: Option<String>,

    /// Write a NetworkManager keyfile into this directory
    #[arg(long)]
    pub keyfile_dir: Option<PathBuf>,

    /// Importer config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the import report as JSON
    #[arg(long)]
    pub json: bool,
}
