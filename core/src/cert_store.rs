//! Storage for credential material pulled out of inline config blocks

use crate::CredentialSlot;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Where inline credentials are written and how
pub trait CertStore {
    /// Deterministic location for a profile's slot
    fn cert_path(&self, profile_name: &str, slot: CredentialSlot) -> PathBuf;

    /// Write secret material readable only by the owner, creating parents
    fn write_secret_file(&self, content: &[u8], path: &Path) -> io::Result<()>;
}

/// Certificate store rooted at a directory on the local file system
#[derive(Debug, Clone)]
pub struct FsCertStore {
    root: PathBuf,
}

impl Default for FsCertStore {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

impl FsCertStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.cert/nm-openvpn`, the directory NetworkManager's OpenVPN plugin
    /// is allowed to read under SELinux
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".cert")
            .join("nm-openvpn")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CertStore for FsCertStore {
    fn cert_path(&self, profile_name: &str, slot: CredentialSlot) -> PathBuf {
        self.root
            .join(format!("{}-{}.pem", profile_name, slot.directive()))
    }

    fn write_secret_file(&self, content: &[u8], path: &Path) -> io::Result<()> {
        if content.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to write empty credential",
            ));
        }

        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path)?;
        file.write_all(content)?;
        file.sync_all()?;

        // The file may have existed with wider permissions
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir)
}
