//! OVPN Import - command line entry point
//!
//! Imports one `.ovpn` file: parses it, writes inline credentials under the
//! certificate directory, validates the result and optionally writes a
//! NetworkManager keyfile.

mod args;

use args::Args;
use clap::Parser;
use ovpn_profile_core::{
    ConnectionProfileBuilder, FileLog, ImportReport, Importer, ImporterConfig, LogFacade, LogSink,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Set up logging
    env_logger::init();

    // Usage errors exit with status 2
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the imported profile is usable
fn run(args: &Args) -> ovpn_profile_core::Result<bool> {
    let config = match &args.config {
        Some(path) => ImporterConfig::load(path)?,
        None => ImporterConfig::load_or_default()?,
    };

    // The log file lives for the whole run and is lent to the core
    let file_log = match &config.paths.log_file {
        Some(path) => Some(FileLog::open(path)?),
        None => None,
    };
    let log: &dyn LogSink = match &file_log {
        Some(file_log) => file_log,
        None => &LogFacade,
    };

    let store = config.cert_store();
    let report = Importer::from_config(&config, &store, log).import_file(&args.file)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    if !report.is_usable() {
        return Ok(false);
    }

    if let Some(dir) = &args.keyfile_dir {
        let id = args.name.as_deref().unwrap_or(&report.profile.name);
        let connection =
            ConnectionProfileBuilder::build(&report.profile, id, args.username.as_deref())?;
        let path = connection.write_keyfile(dir)?;
        log.info(&format!("Wrote connection keyfile: {}", path.display()));
        if !args.json {
            println!("Keyfile: {}", path.display());
        }
    }

    Ok(true)
}

fn print_report(report: &ImportReport) {
    let profile = &report.profile;

    println!("Imported: {}", profile.name);
    match profile.primary_remote() {
        Some(remote) => println!(
            "  Remote: {} ({}){}",
            remote.address(),
            remote.protocol.as_str(),
            if profile.remotes.len() > 1 {
                format!(" +{} more", profile.remotes.len() - 1)
            } else {
                String::new()
            }
        ),
        None => println!("  Remote: none"),
    }
    println!(
        "  Device: {} ({})",
        profile.device,
        profile.device_kind().as_str()
    );
    println!(
        "  Auth: {}",
        if profile.requires_password() {
            "username/password"
        } else {
            "certificate"
        }
    );
    for slot in ovpn_profile_core::CredentialSlot::ALL {
        if let Some(path) = profile.resolved_credential_path(slot) {
            println!("  {}: {}", slot.label(), path.display());
        }
    }
    println!("  Remote-cert-tls: {}", profile.remote_cert_tls);
    println!("  TLS-version-min: {}", profile.tls_version_min);
    if let Some(cipher) = &profile.cipher {
        println!("  Cipher: {}", cipher);
    }
    if let Some(auth) = &profile.auth {
        println!("  Auth digest: {}", auth);
    }

    for warning in &profile.warnings {
        println!("  warning (line {}): {}", warning.line, warning.message);
    }

    if report.validation.ok {
        println!("Profile is valid");
    } else {
        println!("Profile is not usable:");
        for reason in &report.validation.reasons {
            println!("  - {}", reason);
        }
    }
}
