//! NetworkManager connection profile generation from a parsed `.ovpn`

use crate::{ConfigProfile, CredentialSlot, DeviceKind, Error, Protocol, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// VPN service type of the NetworkManager OpenVPN plugin
pub const OPENVPN_SERVICE_TYPE: &str = "org.freedesktop.NetworkManager.openvpn";

/// How the connection authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Client certificate and key
    Tls,
    /// Username and password, CA only
    Password,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Tls => "tls",
            ConnectionType::Password => "password",
        }
    }
}

/// A connection ready to hand to NetworkManager
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub id: String,
    pub uuid: Uuid,
    pub connection_type: ConnectionType,
    /// File name stem for the keyfile
    pub file_stem: String,
    /// `[vpn]` data items, sorted by key
    pub vpn_data: BTreeMap<String, String>,
}

impl ConnectionProfile {
    /// Render as a NetworkManager keyfile
    pub fn to_keyfile(&self) -> String {
        let mut lines = Vec::new();

        lines.push("[connection]".to_string());
        lines.push(format!("id={}", self.id));
        lines.push(format!("uuid={}", self.uuid));
        lines.push("type=vpn".to_string());
        lines.push("autoconnect=false".to_string());
        lines.push(String::new());

        lines.push("[vpn]".to_string());
        for (key, value) in &self.vpn_data {
            lines.push(format!("{}={}", key, value));
        }
        lines.push(format!("service-type={}", OPENVPN_SERVICE_TYPE));
        lines.push(String::new());

        lines.push("[ipv4]".to_string());
        lines.push("method=auto".to_string());
        lines.push(String::new());

        lines.push("[ipv6]".to_string());
        lines.push("method=auto".to_string());

        lines.join("\n") + "\n"
    }

    /// Write `<file_stem>.nmconnection` into `dir`, owner read/write only
    pub fn write_keyfile(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.nmconnection", self.file_stem));
        fs::create_dir_all(dir)?;
        fs::write(&path, self.to_keyfile())?;

        // NetworkManager ignores keyfiles readable by others
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(path)
    }
}

/// Builder for NetworkManager OpenVPN connections
#[derive(Debug)]
pub struct ConnectionProfileBuilder;

impl ConnectionProfileBuilder {
    /// Build a connection from a validated profile.
    ///
    /// Credential paths are resolved against the profile's source directory.
    /// Password-authenticated profiles need a username.
    pub fn build(
        profile: &ConfigProfile,
        id: &str,
        username: Option<&str>,
    ) -> Result<ConnectionProfile> {
        let remote = profile.primary_remote().ok_or_else(|| {
            Error::validation(format!("Profile '{}' has no remote server", profile.name))
        })?;

        let connection_type = if profile.requires_password() {
            ConnectionType::Password
        } else {
            ConnectionType::Tls
        };

        let mut data = BTreeMap::new();
        data.insert("remote".to_string(), remote.address());
        if remote.protocol == Protocol::Tcp || profile.protocol == Protocol::Tcp {
            data.insert("proto-tcp".to_string(), "yes".to_string());
        }
        data.insert(
            "connection-type".to_string(),
            connection_type.as_str().to_string(),
        );

        if connection_type == ConnectionType::Password {
            match username.map(str::trim).filter(|u| !u.is_empty()) {
                Some(user) => {
                    data.insert("username".to_string(), user.to_string());
                }
                None => {
                    return Err(Error::validation(
                        "Username is required for this VPN connection",
                    ))
                }
            }
        }

        data.insert("dev".to_string(), profile.device.clone());
        if profile.device_kind() == DeviceKind::Tap {
            data.insert("dev-type".to_string(), "tap".to_string());
        }

        for (slot, key) in [
            (CredentialSlot::Ca, "ca"),
            (CredentialSlot::Cert, "cert"),
            (CredentialSlot::Key, "key"),
            (CredentialSlot::TlsAuth, "ta"),
            (CredentialSlot::TlsCrypt, "tls-crypt"),
        ] {
            if let Some(path) = profile.resolved_credential_path(slot) {
                data.insert(key.to_string(), path.to_string_lossy().into_owned());
            }
        }
        if profile.cert_pass_flags_zero {
            data.insert("cert-pass-flags".to_string(), "0".to_string());
        }
        if data.contains_key("ta") {
            if let Some(direction) = &profile.key_direction {
                data.insert("ta-dir".to_string(), direction.clone());
            }
        }

        data.insert(
            "remote-cert-tls".to_string(),
            profile.remote_cert_tls.clone(),
        );
        data.insert(
            "tls-version-min".to_string(),
            profile.tls_version_min.clone(),
        );
        if let Some(cipher) = &profile.cipher {
            data.insert("cipher".to_string(), cipher.clone());
        }
        if let Some(auth) = &profile.auth {
            data.insert("auth".to_string(), auth.clone());
        }
        if profile.comp_lzo {
            data.insert("comp-lzo".to_string(), "yes".to_string());
        }
        if profile.redirect_gateway {
            data.insert("redirect-gateway".to_string(), "yes".to_string());
        }

        Ok(ConnectionProfile {
            id: id.to_string(),
            uuid: Uuid::new_v4(),
            connection_type,
            file_stem: profile.name.clone(),
            vpn_data: data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credential, RemoteEndpoint};
    use tempfile::tempdir;

    fn tls_profile() -> ConfigProfile {
        let mut profile = ConfigProfile::new("office");
        profile.source_dir = Some(PathBuf::from("/etc/openvpn"));
        profile
            .remotes
            .push(RemoteEndpoint::new("vpn.example.com").with_port(443));
        profile.ca = Credential::from_path("ca.crt");
        profile.cert = Credential::from_path("/srv/keys/client.crt");
        profile.key = Credential::from_path("client.key");
        profile
    }

    #[test]
    fn test_build_tls_connection() {
        let mut profile = tls_profile();
        profile.tls_auth = Credential::from_path("ta.key");
        profile.key_direction = Some("1".to_string());
        profile.cipher = Some("AES-256-GCM".to_string());
        profile.comp_lzo = true;
        profile.redirect_gateway = true;

        let conn = ConnectionProfileBuilder::build(&profile, "Office", None).unwrap();
        assert_eq!(conn.connection_type, ConnectionType::Tls);
        assert_eq!(conn.vpn_data["remote"], "vpn.example.com:443");
        assert_eq!(conn.vpn_data["connection-type"], "tls");
        assert_eq!(conn.vpn_data["ca"], "/etc/openvpn/ca.crt");
        assert_eq!(conn.vpn_data["cert"], "/srv/keys/client.crt");
        assert_eq!(conn.vpn_data["key"], "/etc/openvpn/client.key");
        assert_eq!(conn.vpn_data["ta"], "/etc/openvpn/ta.key");
        assert_eq!(conn.vpn_data["ta-dir"], "1");
        assert_eq!(conn.vpn_data["cert-pass-flags"], "0");
        assert_eq!(conn.vpn_data["remote-cert-tls"], "server");
        assert_eq!(conn.vpn_data["tls-version-min"], "1.2");
        assert_eq!(conn.vpn_data["cipher"], "AES-256-GCM");
        assert_eq!(conn.vpn_data["comp-lzo"], "yes");
        assert_eq!(conn.vpn_data["redirect-gateway"], "yes");
        assert!(!conn.vpn_data.contains_key("proto-tcp"));
        assert!(!conn.vpn_data.contains_key("dev-type"));
    }

    #[test]
    fn test_tcp_and_tap() {
        let mut profile = tls_profile();
        profile.remotes[0].protocol = Protocol::Tcp;
        profile.device = "tap0".to_string();

        let conn = ConnectionProfileBuilder::build(&profile, "Office", None).unwrap();
        assert_eq!(conn.vpn_data["proto-tcp"], "yes");
        assert_eq!(conn.vpn_data["dev"], "tap0");
        assert_eq!(conn.vpn_data["dev-type"], "tap");
    }

    #[test]
    fn test_password_requires_username() {
        let mut profile = tls_profile();
        profile.auth_user_pass = true;

        assert!(ConnectionProfileBuilder::build(&profile, "Office", None).is_err());
        assert!(ConnectionProfileBuilder::build(&profile, "Office", Some("  ")).is_err());

        let conn = ConnectionProfileBuilder::build(&profile, "Office", Some("alice")).unwrap();
        assert_eq!(conn.connection_type, ConnectionType::Password);
        assert_eq!(conn.vpn_data["connection-type"], "password");
        assert_eq!(conn.vpn_data["username"], "alice");
    }

    #[test]
    fn test_no_remote_is_error() {
        let profile = ConfigProfile::new("empty");
        let err = ConnectionProfileBuilder::build(&profile, "Empty", None).unwrap_err();
        assert!(err.to_string().contains("no remote"));
    }

    #[test]
    fn test_keyfile_layout() {
        let conn = ConnectionProfileBuilder::build(&tls_profile(), "Office", None).unwrap();
        let keyfile = conn.to_keyfile();

        assert!(keyfile.starts_with("[connection]\nid=Office\n"));
        assert!(keyfile.contains(&format!("uuid={}", conn.uuid)));
        assert!(keyfile.contains("type=vpn"));
        assert!(keyfile.contains(&format!("service-type={}", OPENVPN_SERVICE_TYPE)));
        assert!(keyfile.contains("[ipv4]\nmethod=auto"));
        // Data items come out sorted
        let ca = keyfile.find("\nca=").unwrap();
        let remote = keyfile.find("\nremote=").unwrap();
        assert!(ca < remote);
    }

    #[test]
    fn test_write_keyfile() {
        let dir = tempdir().unwrap();
        let conn = ConnectionProfileBuilder::build(&tls_profile(), "Office", None).unwrap();

        let path = conn.write_keyfile(&dir.path().join("system-connections")).unwrap();
        assert_eq!(path.file_name().unwrap(), "office.nmconnection");
        assert_eq!(fs::read_to_string(&path).unwrap(), conn.to_keyfile());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
