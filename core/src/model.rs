//! Domain model types for imported OpenVPN profiles

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of `remote` entries kept per profile
pub const MAX_REMOTES: usize = 10;

/// Port used when neither `remote` nor `port` gives one
pub const DEFAULT_PORT: u16 = 1194;

pub const DEFAULT_DEVICE: &str = "tun";
pub const DEFAULT_REMOTE_CERT_TLS: &str = "server";
pub const DEFAULT_TLS_VERSION_MIN: &str = "1.2";

/// Transport protocol for a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }

    /// Parse the protocol tokens OpenVPN accepts in `proto` and `remote`
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "udp" | "udp4" | "udp6" => Some(Protocol::Udp),
            "tcp" | "tcp4" | "tcp6" | "tcp-client" => Some(Protocol::Tcp),
            _ => None,
        }
    }
}

/// Virtual network device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Tun,
    Tap,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Tun => "tun",
            DeviceKind::Tap => "tap",
        }
    }

    /// Classify a `dev` value such as `tun`, `tun0` or `tap1`
    pub fn from_device(device: &str) -> Option<Self> {
        if device.starts_with("tun") {
            Some(DeviceKind::Tun)
        } else if device.starts_with("tap") {
            Some(DeviceKind::Tap)
        } else {
            None
        }
    }
}

/// One candidate server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            protocol: Protocol::Udp,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// `host:port` as handed to connection managers
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Credential slots a profile can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialSlot {
    Ca,
    Cert,
    Key,
    TlsAuth,
    TlsCrypt,
    TlsCryptV2,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 6] = [
        CredentialSlot::Ca,
        CredentialSlot::Cert,
        CredentialSlot::Key,
        CredentialSlot::TlsAuth,
        CredentialSlot::TlsCrypt,
        CredentialSlot::TlsCryptV2,
    ];

    /// Directive name, inline tag name and generated file suffix
    pub fn directive(&self) -> &'static str {
        match self {
            CredentialSlot::Ca => "ca",
            CredentialSlot::Cert => "cert",
            CredentialSlot::Key => "key",
            CredentialSlot::TlsAuth => "tls-auth",
            CredentialSlot::TlsCrypt => "tls-crypt",
            CredentialSlot::TlsCryptV2 => "tls-crypt-v2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CredentialSlot::Ca => "CA certificate",
            CredentialSlot::Cert => "Client certificate",
            CredentialSlot::Key => "Private key",
            CredentialSlot::TlsAuth => "TLS auth key",
            CredentialSlot::TlsCrypt => "TLS crypt key",
            CredentialSlot::TlsCryptV2 => "TLS crypt v2 key",
        }
    }

    pub fn from_directive(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.directive() == name)
    }
}

/// Where the material for a credential slot comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CredentialSource {
    #[default]
    Absent,
    FilePath(String),
    Inline(String),
}

/// A credential slot plus whether inline material was ever supplied for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Credential {
    pub source: CredentialSource,
    /// Set when the current source came from an inline block, kept after
    /// materialization so a failed write stays distinguishable from "never set"
    pub had_inline: bool,
}

impl Credential {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            source: CredentialSource::FilePath(path.into()),
            had_inline: false,
        }
    }

    pub fn from_inline(content: impl Into<String>) -> Self {
        Self {
            source: CredentialSource::Inline(content.into()),
            had_inline: true,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.source {
            CredentialSource::FilePath(path) => Some(path),
            _ => None,
        }
    }

    pub fn inline(&self) -> Option<&str> {
        match &self.source {
            CredentialSource::Inline(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.source, CredentialSource::Absent)
    }
}

/// Diagnostic copy of the accepted config lines, capped at a fixed size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    text: String,
    cap: usize,
    truncated: bool,
}

impl RawText {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
            truncated: false,
        }
    }

    /// Append a line and a newline; once a line does not fit, it and every
    /// later line are dropped and the buffer is marked truncated
    pub fn push_line(&mut self, line: &str) {
        if self.truncated || self.text.len() + line.len() + 1 > self.cap {
            self.truncated = true;
            return;
        }
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Default for RawText {
    fn default() -> Self {
        Self::with_cap(8192)
    }
}

/// A recognized line that was malformed or is not supported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

/// Normalized result of parsing one `.ovpn` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProfile {
    /// Filesystem-safe name derived from the source file
    pub name: String,
    /// Directory of the source file; relative credential paths resolve here
    pub source_dir: Option<PathBuf>,
    pub remotes: Vec<RemoteEndpoint>,
    pub protocol: Protocol,
    pub port: u16,
    pub device: String,
    pub ca: Credential,
    pub cert: Credential,
    pub key: Credential,
    pub tls_auth: Credential,
    pub tls_crypt: Credential,
    /// Parsed and materialized, but not consumed by validation or the
    /// connection profile
    pub tls_crypt_v2: Credential,
    pub key_direction: Option<String>,
    pub remote_cert_tls: String,
    pub tls_version_min: String,
    pub cert_pass_flags_zero: bool,
    pub auth_user_pass: bool,
    pub cipher: Option<String>,
    pub auth: Option<String>,
    pub comp_lzo: bool,
    pub redirect_gateway: bool,
    pub raw_text: RawText,
    pub warnings: Vec<ParseWarning>,
}

impl ConfigProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_dir: None,
            remotes: Vec::new(),
            protocol: Protocol::Udp,
            port: DEFAULT_PORT,
            device: DEFAULT_DEVICE.to_string(),
            ca: Credential::default(),
            cert: Credential::default(),
            key: Credential::default(),
            tls_auth: Credential::default(),
            tls_crypt: Credential::default(),
            tls_crypt_v2: Credential::default(),
            key_direction: None,
            remote_cert_tls: DEFAULT_REMOTE_CERT_TLS.to_string(),
            tls_version_min: DEFAULT_TLS_VERSION_MIN.to_string(),
            cert_pass_flags_zero: true,
            auth_user_pass: false,
            cipher: None,
            auth: None,
            comp_lzo: false,
            redirect_gateway: false,
            raw_text: RawText::default(),
            warnings: Vec::new(),
        }
    }

    /// The first remote, used as the connection target
    pub fn primary_remote(&self) -> Option<&RemoteEndpoint> {
        self.remotes.first()
    }

    /// Device kind of `device`; the parser only stores tun/tap devices
    pub fn device_kind(&self) -> DeviceKind {
        DeviceKind::from_device(&self.device).unwrap_or(DeviceKind::Tun)
    }

    pub fn credential(&self, slot: CredentialSlot) -> &Credential {
        match slot {
            CredentialSlot::Ca => &self.ca,
            CredentialSlot::Cert => &self.cert,
            CredentialSlot::Key => &self.key,
            CredentialSlot::TlsAuth => &self.tls_auth,
            CredentialSlot::TlsCrypt => &self.tls_crypt,
            CredentialSlot::TlsCryptV2 => &self.tls_crypt_v2,
        }
    }

    pub fn credential_mut(&mut self, slot: CredentialSlot) -> &mut Credential {
        match slot {
            CredentialSlot::Ca => &mut self.ca,
            CredentialSlot::Cert => &mut self.cert,
            CredentialSlot::Key => &mut self.key,
            CredentialSlot::TlsAuth => &mut self.tls_auth,
            CredentialSlot::TlsCrypt => &mut self.tls_crypt,
            CredentialSlot::TlsCryptV2 => &mut self.tls_crypt_v2,
        }
    }

    /// Resolve a credential path against the source file's directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.source_dir {
            Some(dir) if !path.is_absolute() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Resolved file path of a slot, if it currently references a file
    pub fn resolved_credential_path(&self, slot: CredentialSlot) -> Option<PathBuf> {
        self.credential(slot)
            .path()
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve_path(p))
    }

    /// Password-based auth: needs a username instead of a client cert/key
    pub fn requires_password(&self) -> bool {
        self.auth_user_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_tokens() {
        assert_eq!(Protocol::from_token("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::from_token("TCP"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_token("tcp-client"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_token("udp6"), Some(Protocol::Udp));
        assert_eq!(Protocol::from_token("sctp"), None);
    }

    #[test]
    fn test_device_kind() {
        assert_eq!(DeviceKind::from_device("tun0"), Some(DeviceKind::Tun));
        assert_eq!(DeviceKind::from_device("tap"), Some(DeviceKind::Tap));
        assert_eq!(DeviceKind::from_device("wg0"), None);
    }

    #[test]
    fn test_raw_text_cap() {
        let mut raw = RawText::with_cap(12);
        raw.push_line("dev tun");
        assert!(!raw.is_truncated());
        raw.push_line("proto udp");
        assert!(raw.is_truncated());
        // Later short lines are still dropped
        raw.push_line("a");
        assert_eq!(raw.as_str(), "dev tun\n");
    }

    #[test]
    fn test_resolve_path() {
        let mut profile = ConfigProfile::new("work");
        assert_eq!(profile.resolve_path("ca.crt"), PathBuf::from("ca.crt"));

        profile.source_dir = Some(PathBuf::from("/etc/openvpn"));
        assert_eq!(
            profile.resolve_path("ca.crt"),
            PathBuf::from("/etc/openvpn/ca.crt")
        );
        assert_eq!(
            profile.resolve_path("/srv/keys/ca.crt"),
            PathBuf::from("/srv/keys/ca.crt")
        );
    }

    #[test]
    fn test_slot_directives() {
        for slot in CredentialSlot::ALL {
            assert_eq!(CredentialSlot::from_directive(slot.directive()), Some(slot));
        }
        assert_eq!(CredentialSlot::from_directive("dh"), None);
    }
}
