//! Credential checks that decide whether a parsed profile is usable

use crate::{ConfigProfile, CredentialSlot, CredentialSource, LogSink};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Outcome of validating a profile; `reasons` follows rule order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub ok: bool,
    pub reasons: Vec<String>,
}

impl ValidationResult {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            ok: reasons.is_empty(),
            reasons,
        }
    }
}

/// Check every credential rule and report all failures at once.
///
/// Rules run in a fixed order: CA, client certificate, private key, TLS auth
/// key, TLS crypt key. Client certificate and key are skipped for
/// password-authenticated profiles. Nothing on disk is modified.
pub fn validate_profile(profile: &ConfigProfile, log: &dyn LogSink) -> ValidationResult {
    let mut reasons = Vec::new();

    check_required(profile, CredentialSlot::Ca, &mut reasons);
    if !profile.auth_user_pass {
        check_required(profile, CredentialSlot::Cert, &mut reasons);
        check_required(profile, CredentialSlot::Key, &mut reasons);
    }
    check_optional(profile, CredentialSlot::TlsAuth, &mut reasons);
    check_optional(profile, CredentialSlot::TlsCrypt, &mut reasons);

    for reason in &reasons {
        log.error(reason);
    }

    ValidationResult::from_reasons(reasons)
}

fn check_required(profile: &ConfigProfile, slot: CredentialSlot, reasons: &mut Vec<String>) {
    let credential = profile.credential(slot);
    match &credential.source {
        CredentialSource::FilePath(path) if !path.is_empty() => {
            check_readable(profile, slot, path, reasons);
        }
        // Not yet written out, but the material is there
        CredentialSource::Inline(_) => {}
        _ if credential.had_inline => reasons.push(format!(
            "Inline {} could not be written to disk",
            slot.label().to_lowercase()
        )),
        _ => reasons.push(format!("{} is required", slot.label())),
    }
}

fn check_optional(profile: &ConfigProfile, slot: CredentialSlot, reasons: &mut Vec<String>) {
    if let Some(path) = profile.credential(slot).path().filter(|p| !p.is_empty()) {
        check_readable(profile, slot, path, reasons);
    }
}

fn check_readable(
    profile: &ConfigProfile,
    slot: CredentialSlot,
    path: &str,
    reasons: &mut Vec<String>,
) {
    let resolved = profile.resolve_path(path);
    if !is_readable_file(&resolved) {
        reasons.push(format!(
            "{} file not found or unreadable: {}",
            slot.label(),
            resolved.display()
        ));
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigParser, Credential, FsCertStore, MemoryLog, ParseOptions};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// A config directory holding the given credential files
    fn config_dir(files: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for name in files {
            fs::write(dir.path().join(name), "-----BEGIN-----\n").unwrap();
        }
        dir
    }

    fn parse_in(dir: &TempDir, content: &str) -> ConfigProfile {
        let path = dir.path().join("office.ovpn");
        fs::write(&path, content).unwrap();
        let store = FsCertStore::new(dir.path().join("certs"));
        let log = MemoryLog::new();
        ConfigParser::new(ParseOptions::default(), &store, &log)
            .parse_file(&path)
            .unwrap()
    }

    const CERT_CONFIG: &str = "remote vpn.example.com 443 tcp\n\
                               ca ca.crt\ncert client.crt\nkey client.key\n";

    #[test]
    fn test_all_files_present() {
        let dir = config_dir(&["ca.crt", "client.crt", "client.key"]);
        let profile = parse_in(&dir, CERT_CONFIG);
        let log = MemoryLog::new();

        let result = validate_profile(&profile, &log);
        assert!(result.ok);
        assert!(result.reasons.is_empty());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_missing_key_names_path() {
        let dir = config_dir(&["ca.crt", "client.crt"]);
        let profile = parse_in(&dir, CERT_CONFIG);
        let log = MemoryLog::new();

        let result = validate_profile(&profile, &log);
        assert!(!result.ok);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].starts_with("Private key"));
        assert!(result.reasons[0].contains("client.key"));
        assert_eq!(log.messages_at(log::Level::Error), result.reasons);
    }

    #[test]
    fn test_password_auth_skips_cert_and_key() {
        let dir = config_dir(&["ca.crt"]);
        let profile = parse_in(&dir, "remote vpn.example.com\nca ca.crt\nauth-user-pass\n");

        let result = validate_profile(&profile, &MemoryLog::new());
        assert!(result.ok);

        // CA is still required
        let profile = parse_in(&dir, "remote vpn.example.com\nauth-user-pass\n");
        let result = validate_profile(&profile, &MemoryLog::new());
        assert_eq!(result.reasons, vec!["CA certificate is required".to_string()]);
    }

    #[test]
    fn test_reasons_follow_rule_order() {
        let dir = config_dir(&[]);
        let profile = parse_in(
            &dir,
            "tls-crypt tc.key\ntls-auth ta.key 1\nkey client.key\ncert client.crt\n",
        );

        let result = validate_profile(&profile, &MemoryLog::new());
        let prefixes: Vec<&str> = result
            .reasons
            .iter()
            .map(|r| r.split(" file").next().unwrap_or(r))
            .collect();
        assert_eq!(
            prefixes,
            vec![
                "CA certificate is required",
                "Client certificate",
                "Private key",
                "TLS auth key",
                "TLS crypt key",
            ]
        );
    }

    #[test]
    fn test_optional_keys_absent_is_fine() {
        let dir = config_dir(&["ca.crt", "client.crt", "client.key", "ta.key"]);
        let profile = parse_in(&dir, &format!("{}tls-auth ta.key 0\n", CERT_CONFIG));

        assert!(validate_profile(&profile, &MemoryLog::new()).ok);
    }

    #[test]
    fn test_materialized_inline_passes() {
        let dir = config_dir(&[]);
        let profile = parse_in(
            &dir,
            "<ca>\nCA\n</ca>\n<cert>\nCERT\n</cert>\n<key>\nKEY\n</key>\n<tls-crypt>\nTC\n</tls-crypt>\n",
        );

        let result = validate_profile(&profile, &MemoryLog::new());
        assert!(result.ok, "{:?}", result.reasons);
    }

    #[test]
    fn test_failed_materialization_is_reported() {
        let dir = config_dir(&["client.crt", "client.key"]);
        let profile = parse_in(&dir, "<ca>\n</ca>\ncert client.crt\nkey client.key\n");

        let result = validate_profile(&profile, &MemoryLog::new());
        assert_eq!(
            result.reasons,
            vec!["Inline ca certificate could not be written to disk".to_string()]
        );
    }

    #[test]
    fn test_unmaterialized_inline_counts_as_present() {
        let mut profile = ConfigProfile::new("manual");
        profile.ca = Credential::from_inline("CA\n");
        profile.auth_user_pass = true;

        assert!(validate_profile(&profile, &MemoryLog::new()).ok);
    }

    #[test]
    fn test_directory_is_not_a_readable_file() {
        let dir = config_dir(&["client.crt", "client.key"]);
        fs::create_dir(dir.path().join("ca.crt")).unwrap();
        let profile = parse_in(&dir, CERT_CONFIG);

        let result = validate_profile(&profile, &MemoryLog::new());
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].starts_with("CA certificate file not found"));
    }
}
