//! OVPN Import Core Library
//!
//! This crate turns OpenVPN client configuration files into validated
//! profiles: it parses the `.ovpn` text, writes inline credentials to
//! private files, checks that every required credential is readable, and
//! renders NetworkManager connection keyfiles.

pub mod cert_store;
pub mod config;
pub mod connection;
pub mod error;
pub mod import;
pub mod logging;
pub mod model;
pub mod parser;
pub mod validator;

pub use cert_store::{CertStore, FsCertStore};
pub use config::ImporterConfig;
pub use connection::{ConnectionProfile, ConnectionProfileBuilder, ConnectionType};
pub use error::{Error, Result};
pub use import::{ImportReport, Importer};
pub use logging::{FileLog, LogFacade, LogSink, MemoryLog};
pub use model::*;
pub use parser::{
    list_openvpn_configs, parse_ovpn_file, profile_name_from_path, ConfigParser, ParseOptions,
};
pub use validator::{validate_profile, ValidationResult};
