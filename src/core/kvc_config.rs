//! Kerio client connection configuration (`/etc/kerio-kvc.conf`).
//!
//! The file is a tiny XML document holding one persistent connection:
//!
//! ```text
//! <config>
//!   <connections>
//!     <connection type="persistent">
//!       <server>vpn.example.com:4090</server>
//!       <username>jdoe</username>
//!       <password>s&#33;cret</password>
//!       <fingerprint>AB:CD:..</fingerprint>
//!       <active>1</active>
//!       <description>Office</description>
//!     </connection>
//!   </connections>
//! </config>
//! ```
//!
//! The client reads special characters as numeric entities, so values are
//! written with a fixed escape table (see [`encode_entities`]). `&` and `#`
//! are written as is.
//!
//! The file is root-owned with mode 600. Reads fall back to `sudo cat` and
//! writes go through a temp file moved into place with `sudo mv`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::AppConfig;
use crate::constants;
use crate::utils;

/// Result type for Kerio config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors from reading, validating or writing the Kerio config.
#[derive(Debug)]
pub enum ConfigError {
    /// The file does not exist (or `sudo cat` could not find it).
    NotFound(PathBuf),
    /// The file exists but could not be read.
    Read(String),
    /// No `<connection type="persistent">` element.
    NoPersistentConnection,
    /// A required field is empty or malformed.
    Invalid(String),
    /// The new file could not be written or moved into place.
    Write(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "{} not found", path.display()),
            Self::Read(msg) => write!(f, "could not read config: {msg}"),
            Self::NoPersistentConnection => write!(f, "no persistent connection found in config"),
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::Write(msg) => write!(f, "could not save config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One persistent Kerio connection.
///
/// `port` is kept as text so a loaded file round-trips even when it holds
/// something [`KvcConfig::validated`] would reject.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KvcConfig {
    pub server: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub description: String,
    /// Connect when the client starts (`<active>`).
    pub autoconnect: bool,
    pub fingerprint: Option<String>,
}

impl std::fmt::Debug for KvcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvcConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &utils::mask_secret(&self.password))
            .field("description", &self.description)
            .field("autoconnect", &self.autoconnect)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl KvcConfig {
    /// `server:port`, or just the server when no port is set.
    pub fn server_label(&self) -> String {
        if self.port.is_empty() {
            self.server.clone()
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    /// Trimmed copy with the default port filled in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if server, username or password is
    /// missing, or the port is not in `1..=65535`.
    pub fn validated(&self) -> Result<Self> {
        let server = self.server.trim();
        if server.is_empty() {
            return Err(ConfigError::Invalid("Server is required".to_string()));
        }
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ConfigError::Invalid("Username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Invalid("Password is required".to_string()));
        }

        let port = match self.port.trim() {
            "" => constants::DEFAULT_KVC_PORT,
            p => match p.parse::<u16>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid(format!("Invalid port: {p}"))),
            },
        };

        Ok(Self {
            server: server.to_string(),
            port: port.to_string(),
            username: username.to_string(),
            password: self.password.clone(),
            description: self.description.trim().to_string(),
            autoconnect: self.autoconnect,
            fingerprint: self.fingerprint.clone(),
        })
    }

    /// Port as a number, once validated.
    pub fn port_number(&self) -> Option<u16> {
        self.port.trim().parse().ok()
    }

    /// Render the file contents. Expects a [`validated`](Self::validated) config.
    pub fn render(&self) -> String {
        let mut lines = vec![
            "<config>".to_string(),
            "  <connections>".to_string(),
            "    <connection type=\"persistent\">".to_string(),
            format!(
                "      <server>{}:{}</server>",
                encode_entities(&self.server),
                self.port
            ),
            format!(
                "      <username>{}</username>",
                encode_entities(&self.username)
            ),
            format!(
                "      <password>{}</password>",
                encode_entities(&self.password)
            ),
        ];
        if let Some(fp) = self.fingerprint.as_deref().filter(|fp| !fp.is_empty()) {
            lines.push(format!("      <fingerprint>{fp}</fingerprint>"));
        }
        lines.push(format!(
            "      <active>{}</active>",
            if self.autoconnect { "1" } else { "0" }
        ));
        if !self.description.is_empty() {
            lines.push(format!(
                "      <description>{}</description>",
                encode_entities(&self.description)
            ));
        }
        lines.push("    </connection>".to_string());
        lines.push("  </connections>".to_string());
        lines.push("</config>".to_string());

        lines.join("\n") + "\n"
    }
}

/// Parse the persistent connection out of a config document.
///
/// # Errors
///
/// Returns [`ConfigError::NoPersistentConnection`] if the document has none.
pub fn parse(xml: &str) -> Result<KvcConfig> {
    let block = persistent_block(xml).ok_or(ConfigError::NoPersistentConnection)?;
    let mut config = KvcConfig::default();

    if let Some(server) = element_text(block, "server").map(|s| decode_entities(&s)) {
        match server.rsplit_once(':') {
            Some((host, port)) => {
                config.server = host.to_string();
                config.port = port.to_string();
            }
            None => config.server = server,
        }
    }
    // A separate <port> element wins over the server suffix.
    if let Some(port) = element_text(block, "port").filter(|p| !p.is_empty()) {
        config.port = port.trim().to_string();
    }
    if let Some(username) = element_text(block, "username") {
        config.username = decode_entities(&username);
    }
    if let Some(password) = element_text(block, "password") {
        config.password = decode_entities(&password);
    }
    if let Some(description) = element_text(block, "description") {
        config.description = decode_entities(&description);
    }
    if let Some(active) = element_text(block, "active") {
        config.autoconnect = matches!(
            active.trim().to_ascii_lowercase().as_str(),
            "yes" | "1" | "true"
        );
    }
    config.fingerprint = element_text(block, "fingerprint")
        .map(|fp| fp.trim().to_string())
        .filter(|fp| !fp.is_empty());

    Ok(config)
}

/// Body of the first `<connection type="persistent">` element.
fn persistent_block(xml: &str) -> Option<&str> {
    let mut rest = xml;
    while let Some(start) = rest.find("<connection") {
        let after = &rest[start + "<connection".len()..];
        let tag_end = after.find('>')?;
        let attrs = &after[..tag_end];
        let is_element = attrs.is_empty() || attrs.starts_with(char::is_whitespace);

        if is_element
            && (attrs.contains("type=\"persistent\"") || attrs.contains("type='persistent'"))
        {
            if attrs.ends_with('/') {
                return Some("");
            }
            let body = &after[tag_end + 1..];
            let end = body.find("</connection>")?;
            return Some(&body[..end]);
        }
        rest = &after[tag_end..];
    }
    None
}

/// Raw text of the first `<name>` child, or `None` if absent.
fn element_text(block: &str, name: &str) -> Option<String> {
    let open = format!("<{name}");
    let close = format!("</{name}>");
    let mut rest = block;

    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let tag_end = after.find('>')?;
        let attrs = &after[..tag_end];
        if attrs.is_empty() || attrs.starts_with(char::is_whitespace) || attrs == "/" {
            if attrs.ends_with('/') {
                return Some(String::new());
            }
            let body = &after[tag_end + 1..];
            let end = body.find(&close)?;
            return Some(body[..end].to_string());
        }
        rest = &after[tag_end..];
    }
    None
}

/// Escape the characters the Kerio client expects as numeric entities.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '!' => out.push_str("&#33;"),
            '"' => out.push_str("&#34;"),
            '$' => out.push_str("&#36;"),
            '%' => out.push_str("&#37;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&#60;"),
            '>' => out.push_str("&#62;"),
            '@' => out.push_str("&#64;"),
            '\\' => out.push_str("&#92;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode named XML entities and numeric `&#NN;` / `&#xHH;` references.
///
/// Anything that is not a well-formed entity (including a bare `&`) is kept
/// literally.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate.find(';').and_then(|semi| {
            decode_entity(&candidate[1..semi]).map(|c| (c, semi))
        }) {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Where the fingerprint in a saved file came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FingerprintSource {
    /// Kept from the file being replaced.
    Preserved,
    /// Fetched from the server during the save.
    Fetched,
    /// Neither worked; saved without one.
    Missing,
}

/// Reads and writes the Kerio config file.
#[derive(Clone, Debug)]
pub struct KvcStore {
    path: PathBuf,
    use_sudo: bool,
    timeout: Duration,
}

impl KvcStore {
    pub const fn new(path: PathBuf, use_sudo: bool, timeout: Duration) -> Self {
        Self {
            path,
            use_sudo,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.kvc_config_path.clone(),
            config.use_sudo,
            config.control_timeout(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents, read directly or through `sudo cat`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] or [`ConfigError::Read`].
    pub fn read_raw(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => return Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.clone()));
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && self.use_sudo => {
                crate::log_debug!("KVC", "Direct read denied, trying sudo cat");
            }
            Err(e) => return Err(ConfigError::Read(e.to_string())),
        }

        let mut cmd = utils::privileged_command("cat", self.use_sudo);
        cmd.arg(&self.path);
        let output = utils::run_with_timeout(&mut cmd, self.timeout)
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such file") {
                return Err(ConfigError::NotFound(self.path.clone()));
            }
            return Err(ConfigError::Read(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Load and parse the persistent connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no persistent
    /// connection.
    pub fn load(&self) -> Result<KvcConfig> {
        parse(&self.read_raw()?)
    }

    /// Fingerprint of the file on disk, if it has one.
    pub fn existing_fingerprint(&self) -> Option<String> {
        self.load().ok().and_then(|c| c.fingerprint)
    }

    /// Validate and write `config`, replacing the file on disk.
    ///
    /// The fingerprint is kept from the current file; if it has none,
    /// `fetch_fingerprint(host, port)` is asked for one. A missing
    /// fingerprint does not fail the save. On any write error the previous
    /// file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for bad input, or
    /// [`ConfigError::Write`] if the file could not be replaced.
    pub fn save(
        &self,
        config: &KvcConfig,
        fetch_fingerprint: impl FnOnce(&str, u16) -> Option<String>,
    ) -> Result<(KvcConfig, FingerprintSource)> {
        let mut config = config.validated()?;
        let port = config
            .port_number()
            .unwrap_or(constants::DEFAULT_KVC_PORT);

        let source = if let Some(fp) = self.existing_fingerprint() {
            config.fingerprint = Some(fp);
            FingerprintSource::Preserved
        } else if let Some(fp) = fetch_fingerprint(&config.server, port) {
            config.fingerprint = Some(fp);
            FingerprintSource::Fetched
        } else {
            config.fingerprint = None;
            FingerprintSource::Missing
        };

        self.write(&config.render())?;
        crate::log_info!("KVC", "Saved {}", self.path.display());
        Ok((config, source))
    }

    fn write(&self, content: &str) -> Result<()> {
        if self.use_sudo && !utils::is_root() {
            self.write_privileged(content)
        } else {
            self.write_direct(content)
        }
    }

    /// Temp file next to the target, then an atomic rename.
    fn write_direct(&self, content: &str) -> Result<()> {
        let tmp = self.path.with_extension("conf.tmp");
        let result = write_private(&tmp, content).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Write(e.to_string()));
        }
        Ok(())
    }

    /// Temp file in the temp dir, then `sudo mv` and `sudo chmod 600`.
    fn write_privileged(&self, content: &str) -> Result<()> {
        let tmp = std::env::temp_dir().join(format!(
            "{}-kvc-{}.conf.tmp",
            constants::APP_NAME,
            std::process::id()
        ));
        if let Err(e) = write_private(&tmp, content) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Write(e.to_string()));
        }

        let mut mv = utils::privileged_command("mv", true);
        mv.arg(&tmp).arg(&self.path);
        if let Err(msg) = self.run_privileged(&mut mv) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Write(msg));
        }

        let mut chmod = utils::privileged_command("chmod", true);
        chmod.arg("600").arg(&self.path);
        if let Err(msg) = self.run_privileged(&mut chmod) {
            crate::log_warning!("KVC", "chmod 600 {}: {msg}", self.path.display());
        }
        Ok(())
    }

    fn run_privileged(&self, cmd: &mut Command) -> std::result::Result<(), String> {
        let output = utils::run_with_timeout(cmd, self.timeout).map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

/// Write `content` to a new file readable by the owner only.
fn write_private(path: &Path, content: &str) -> io::Result<()> {
    #[cfg(unix)]
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
