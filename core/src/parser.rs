//! OpenVPN (.ovpn) client configuration parsing
//!
//! Only the directives needed to build a connection profile are recognized;
//! every other line is skipped. Inline credential blocks are written out
//! through a [`CertStore`] before the profile is returned, so callers always
//! see either a file path or an empty slot.

use crate::{
    CertStore, ConfigProfile, Credential, CredentialSlot, CredentialSource, DeviceKind, Error,
    LogSink, ParseWarning, Protocol, RawText, RemoteEndpoint, Result, DEFAULT_REMOTE_CERT_TLS,
    DEFAULT_TLS_VERSION_MIN, MAX_REMOTES,
};
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Inline file-content blocks OpenVPN accepts that carry nothing we import
const UNSUPPORTED_INLINE_TAGS: [&str; 7] = [
    "extra-certs",
    "dh",
    "pkcs12",
    "crl-verify",
    "secret",
    "auth-user-pass",
    "http-proxy-user-pass",
];

/// Placeholder some generators write instead of a path when a block follows
const INLINE_PLACEHOLDER: &str = "[inline]";

/// Parser limits and strictness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Longest accepted line in bytes, excluding the line terminator
    pub max_line_len: usize,
    /// Byte cap of the diagnostic raw text copy
    pub raw_text_cap: usize,
    /// Reject inline blocks that are still open at end of file
    pub strict_inline_blocks: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_line_len: 2048,
            raw_text_cap: 8192,
            strict_inline_blocks: true,
        }
    }
}

/// Reads lines as bytes so over-long lines fail instead of being cut
struct LineReader<R> {
    reader: R,
    max_len: usize,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            max_len,
            line_no: 0,
            buf: Vec::new(),
        }
    }

    /// Next line with invalid UTF-8 replaced, for directive lines
    fn next_line(&mut self) -> Result<Option<String>> {
        if !self.fill_line()? {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Next line of an inline block; credential bytes are never rewritten
    fn next_block_line(&mut self, tag: &str) -> Result<Option<String>> {
        if !self.fill_line()? {
            return Ok(None);
        }
        match std::str::from_utf8(&self.buf) {
            Ok(line) => Ok(Some(line.to_string())),
            Err(_) => Err(Error::InvalidUtf8 {
                tag: tag.to_string(),
                line: self.line_no,
            }),
        }
    }

    /// Read one line into `buf` without its terminator
    fn fill_line(&mut self) -> Result<bool> {
        self.buf.clear();
        // Room for the longest allowed line plus "\r\n"
        let limit = self.max_len as u64 + 2;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(false);
        }
        self.line_no += 1;

        let terminated = self.buf.last() == Some(&b'\n');
        if terminated {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max_len {
            let mut length = self.buf.len();
            if !terminated {
                length += self.skip_rest_of_line()?;
            }
            return Err(Error::LineTooLong {
                line: self.line_no,
                length,
                max: self.max_len,
            });
        }

        Ok(true)
    }

    /// Consume up to the next newline, returning the bytes skipped before it
    fn skip_rest_of_line(&mut self) -> Result<usize> {
        let mut skipped = 0;
        let mut last = None;
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    if end > 0 {
                        last = Some(available[end - 1]);
                    }
                    skipped += end;
                    self.reader.consume(end + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    last = available.last().copied();
                    skipped += len;
                    self.reader.consume(len);
                }
            }
        }
        if last == Some(b'\r') {
            skipped -= 1;
        }
        Ok(skipped)
    }
}

/// Parser for OpenVPN client configurations
pub struct ConfigParser<'a> {
    options: ParseOptions,
    store: &'a dyn CertStore,
    log: &'a dyn LogSink,
}

impl<'a> ConfigParser<'a> {
    pub fn new(options: ParseOptions, store: &'a dyn CertStore, log: &'a dyn LogSink) -> Self {
        Self {
            options,
            store,
            log,
        }
    }

    /// Parse a config file; the profile is named after the file
    pub fn parse_file(&self, path: &Path) -> Result<ConfigProfile> {
        self.log
            .info(&format!("Parsing OVPN file: {}", path.display()));

        let name = profile_name_from_path(path)?;
        let file = File::open(path).map_err(|source| {
            self.log
                .error(&format!("Failed to open file: {}", path.display()));
            Error::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let source_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);

        let profile = self.parse_inner(BufReader::new(file), &name, source_dir)?;
        self.log
            .info(&format!("End Parsing OVPN file: {}", path.display()));
        Ok(profile)
    }

    /// Parse config text from any line source. Relative credential paths
    /// resolve against the working directory.
    pub fn parse<R: BufRead>(&self, reader: R, config_name: &str) -> Result<ConfigProfile> {
        self.parse_inner(reader, config_name, None)
    }

    fn parse_inner<R: BufRead>(
        &self,
        reader: R,
        config_name: &str,
        source_dir: Option<PathBuf>,
    ) -> Result<ConfigProfile> {
        let mut profile = ConfigProfile::new(config_name);
        profile.source_dir = source_dir;
        profile.raw_text = RawText::with_cap(self.options.raw_text_cap);

        let mut lines = LineReader::new(reader, self.options.max_line_len);

        while let Some(line) = lines.next_line()? {
            let line_no = lines.line_no;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            profile.raw_text.push_line(&line);

            if let Some(tag) = opening_tag(trimmed) {
                if let Some(slot) = CredentialSlot::from_directive(tag) {
                    let content = self.read_inline_block(&mut lines, tag, &mut profile)?;
                    *profile.credential_mut(slot) = Credential::from_inline(content);
                    continue;
                }
                if UNSUPPORTED_INLINE_TAGS.contains(&tag) {
                    self.read_inline_block(&mut lines, tag, &mut profile)?;
                    self.warn(
                        &mut profile,
                        line_no,
                        format!("inline <{}> block is not supported and was skipped", tag),
                    );
                    continue;
                }
            }

            let tokens = tokenize(trimmed);
            if let Some((directive, args)) = tokens.split_first() {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                self.apply_directive(&mut profile, line_no, directive, &args);
            }
        }

        if profile.remote_cert_tls.is_empty() {
            profile.remote_cert_tls = DEFAULT_REMOTE_CERT_TLS.to_string();
        }
        if profile.tls_version_min.is_empty() {
            profile.tls_version_min = DEFAULT_TLS_VERSION_MIN.to_string();
        }
        if !profile.tls_crypt_v2.is_absent() {
            let line_no = lines.line_no;
            self.warn(
                &mut profile,
                line_no,
                "tls-crypt-v2 is parsed but not used by the connection profile".to_string(),
            );
        }

        self.materialize(&mut profile);
        Ok(profile)
    }

    /// Collect lines verbatim up to `</tag>`
    fn read_inline_block<R: BufRead>(
        &self,
        lines: &mut LineReader<R>,
        tag: &str,
        profile: &mut ConfigProfile,
    ) -> Result<String> {
        let opened_at = lines.line_no;
        let end_tag = format!("</{}>", tag);
        let mut content = String::new();

        while let Some(line) = lines.next_block_line(tag)? {
            if line.trim() == end_tag {
                return Ok(content);
            }
            content.push_str(&line);
            content.push('\n');
        }

        if self.options.strict_inline_blocks {
            self.log.error(&format!(
                "Inline block <{}> opened on line {} is never closed",
                tag, opened_at
            ));
            return Err(Error::UnterminatedBlock {
                tag: tag.to_string(),
                line: opened_at,
            });
        }

        self.warn(
            profile,
            opened_at,
            format!("inline <{}> block runs to end of file", tag),
        );
        Ok(content)
    }

    fn apply_directive(
        &self,
        profile: &mut ConfigProfile,
        line_no: usize,
        directive: &str,
        args: &[&str],
    ) {
        let first = args.first().copied();
        match directive {
            "remote" => self.apply_remote(profile, line_no, args),
            "proto" => match first {
                Some(token) => match Protocol::from_token(token) {
                    Some(protocol) => profile.protocol = protocol,
                    None => self.warn(profile, line_no, format!("unknown protocol '{}'", token)),
                },
                None => self.missing_argument(profile, line_no, directive),
            },
            "port" => match first {
                Some(token) => match parse_port(token) {
                    Some(port) => profile.port = port,
                    None => self.warn(profile, line_no, format!("invalid port '{}'", token)),
                },
                None => self.missing_argument(profile, line_no, directive),
            },
            "dev" => match first {
                Some(device) if DeviceKind::from_device(device).is_some() => {
                    profile.device = device.to_string();
                }
                Some(device) => self.warn(
                    profile,
                    line_no,
                    format!("device '{}' is neither tun nor tap", device),
                ),
                None => self.missing_argument(profile, line_no, directive),
            },
            "ca" | "cert" | "key" | "tls-crypt" | "tls-crypt-v2" | "tls-auth" => {
                let Some(slot) = CredentialSlot::from_directive(directive) else {
                    return;
                };
                match first {
                    Some(path) => {
                        // Inline material is written out after the scan and
                        // takes the slot; tls-auth keeps the later directive
                        let holds_inline = slot != CredentialSlot::TlsAuth
                            && matches!(
                                profile.credential(slot).source,
                                CredentialSource::Inline(_)
                            );
                        if holds_inline && path != INLINE_PLACEHOLDER {
                            self.warn(
                                profile,
                                line_no,
                                format!(
                                    "'{} {}' ignored, the inline <{}> block is used",
                                    directive, path, directive
                                ),
                            );
                        } else if path != INLINE_PLACEHOLDER {
                            *profile.credential_mut(slot) = Credential::from_path(path);
                        }
                        if slot == CredentialSlot::TlsAuth {
                            if let Some(direction) = args.get(1) {
                                self.apply_key_direction(profile, line_no, direction);
                            }
                        }
                    }
                    None => self.missing_argument(profile, line_no, directive),
                }
            }
            "key-direction" => match first {
                Some(direction) => self.apply_key_direction(profile, line_no, direction),
                None => self.missing_argument(profile, line_no, directive),
            },
            "remote-cert-tls" => match first {
                Some(value @ ("server" | "client")) => profile.remote_cert_tls = value.to_string(),
                Some(value) => self.warn(
                    profile,
                    line_no,
                    format!("remote-cert-tls must be server or client, got '{}'", value),
                ),
                None => self.missing_argument(profile, line_no, directive),
            },
            "tls-version-min" => match first {
                Some(version) if is_tls_version(version) => {
                    profile.tls_version_min = version.to_string();
                }
                Some(version) => self.warn(
                    profile,
                    line_no,
                    format!("unknown TLS version '{}'", version),
                ),
                None => self.missing_argument(profile, line_no, directive),
            },
            "auth-user-pass" => profile.auth_user_pass = true,
            "comp-lzo" => profile.comp_lzo = first != Some("no"),
            "redirect-gateway" => profile.redirect_gateway = true,
            "cipher" | "auth" => match first {
                Some(name) if token_regex().is_match(name) => {
                    if directive == "cipher" {
                        profile.cipher = Some(name.to_string());
                    } else {
                        profile.auth = Some(name.to_string());
                    }
                }
                Some(name) => self.warn(
                    profile,
                    line_no,
                    format!("malformed {} name '{}'", directive, name),
                ),
                None => self.missing_argument(profile, line_no, directive),
            },
            _ => {}
        }
    }

    /// `remote <host> [port] [proto]`
    fn apply_remote(&self, profile: &mut ConfigProfile, line_no: usize, args: &[&str]) {
        let Some(host) = args.first() else {
            self.missing_argument(profile, line_no, "remote");
            return;
        };

        let mut remote = RemoteEndpoint::new(*host);
        if let Some(token) = args.get(1) {
            match parse_port(token) {
                Some(port) => remote.port = port,
                None => {
                    self.warn(profile, line_no, format!("invalid remote port '{}'", token));
                    return;
                }
            }
        }
        if let Some(token) = args.get(2) {
            match Protocol::from_token(token) {
                Some(protocol) => remote.protocol = protocol,
                None => {
                    self.warn(
                        profile,
                        line_no,
                        format!("unknown remote protocol '{}'", token),
                    );
                    return;
                }
            }
        }

        if profile.remotes.len() >= MAX_REMOTES {
            self.log.log(
                log::Level::Debug,
                &format!("Ignoring remote {} beyond the first {}", host, MAX_REMOTES),
            );
            return;
        }
        profile.remotes.push(remote);
    }

    fn apply_key_direction(&self, profile: &mut ConfigProfile, line_no: usize, direction: &str) {
        if direction == "0" || direction == "1" {
            profile.key_direction = Some(direction.to_string());
        } else {
            self.warn(
                profile,
                line_no,
                format!("key direction must be 0 or 1, got '{}'", direction),
            );
        }
    }

    fn missing_argument(&self, profile: &mut ConfigProfile, line_no: usize, directive: &str) {
        self.warn(
            profile,
            line_no,
            format!("'{}' requires an argument", directive),
        );
    }

    fn warn(&self, profile: &mut ConfigProfile, line: usize, message: String) {
        self.log.warn(&format!("line {}: {}", line, message));
        profile.warnings.push(ParseWarning { line, message });
    }

    /// Write every inline slot to the cert store and point the slot at the
    /// file. A failed write leaves the slot empty; parsing still succeeds.
    fn materialize(&self, profile: &mut ConfigProfile) {
        let name = profile.name.clone();
        for slot in CredentialSlot::ALL {
            let credential = profile.credential_mut(slot);
            let content = match std::mem::take(&mut credential.source) {
                CredentialSource::Inline(content) => content,
                other => {
                    credential.source = other;
                    continue;
                }
            };

            let path = absolute_path(self.store.cert_path(&name, slot));
            match self.store.write_secret_file(content.as_bytes(), &path) {
                Ok(()) => {
                    credential.source =
                        CredentialSource::FilePath(path.to_string_lossy().into_owned());
                    self.log
                        .info(&format!("Created cert file: {}", path.display()));
                }
                Err(e) => {
                    credential.source = CredentialSource::Absent;
                    self.log.warn(&format!(
                        "Failed to create cert file {}: {}",
                        path.display(),
                        e
                    ));
                }
            }
        }
    }
}

/// Anchor a relative store path at the working directory, so later
/// resolution against the config's directory still finds the written file
fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// Parse a `.ovpn` file with default options
pub fn parse_ovpn_file(
    path: &Path,
    store: &dyn CertStore,
    log: &dyn LogSink,
) -> Result<ConfigProfile> {
    ConfigParser::new(ParseOptions::default(), store, log).parse_file(path)
}

/// Filesystem-safe profile name from a config file's base name
pub fn profile_name_from_path(path: &Path) -> Result<String> {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = unsafe_chars.replace_all(stem.trim(), "_").to_string();

    if name.is_empty() {
        return Err(Error::validation(format!(
            "Cannot derive a profile name from {}",
            path.display()
        )));
    }
    Ok(name)
}

/// List OpenVPN config files in a directory, sorted by file name
pub fn list_openvpn_configs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut configs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
        if path.is_file() && matches!(ext.as_deref(), Some("ovpn") | Some("conf")) {
            configs.push(path);
        }
    }

    configs.sort();
    Ok(configs)
}

/// Tag name of an opening `<tag>` line
fn opening_tag(line: &str) -> Option<&str> {
    let tag = line.strip_prefix('<')?.strip_suffix('>')?;
    if tag.is_empty() || tag.starts_with('/') || tag.contains(char::is_whitespace) {
        return None;
    }
    Some(tag)
}

/// Split a directive line into tokens, honoring quotes and trailing comments
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None if !in_token && (c == '#' || c == ';') => break,
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    tokens
}

fn parse_port(token: &str) -> Option<u16> {
    token.parse::<u16>().ok().filter(|port| *port != 0)
}

fn is_tls_version(version: &str) -> bool {
    matches!(version, "1.0" | "1.1" | "1.2" | "1.3")
}

/// Cipher and HMAC names: one well-formed token, no allow-list
fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap())
}
