//! Server certificate fingerprint lookup.
//!
//! The Kerio client pins the server certificate by its SHA-1 fingerprint.
//! We derive it with two `openssl` invocations: `s_client` to fetch the
//! chain, then `x509 -fingerprint` on the first certificate.

use std::process::Command;
use std::time::Duration;

use crate::utils::{self, RunError};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

#[derive(Debug)]
pub enum FingerprintError {
    /// `openssl` could not be run or timed out.
    Run(RunError),
    /// The handshake produced no certificate.
    NoCertificate,
    /// `openssl x509` did not print a fingerprint.
    NoFingerprint,
}

impl std::fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(e) => write!(f, "openssl: {e}"),
            Self::NoCertificate => write!(f, "server did not present a certificate"),
            Self::NoFingerprint => write!(f, "could not compute certificate fingerprint"),
        }
    }
}

impl std::error::Error for FingerprintError {}

impl From<RunError> for FingerprintError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

/// Fetch the SHA-1 fingerprint of the certificate served at `host:port`.
///
/// # Errors
///
/// Returns an error if `openssl` is missing, times out, or the server
/// presents no usable certificate.
pub fn fetch(host: &str, port: u16, timeout: Duration) -> Result<String, FingerprintError> {
    let target = format!("{host}:{port}");
    let mut s_client = Command::new("openssl");
    s_client.args(["s_client", "-connect", target.as_str(), "-showcerts"]);
    // Empty stdin makes s_client exit right after the handshake.
    let output = utils::run_with_input(&mut s_client, Some(""), timeout)?;
    let pem = extract_pem(&String::from_utf8_lossy(&output.stdout))
        .ok_or(FingerprintError::NoCertificate)?;

    let mut x509 = Command::new("openssl");
    x509.args(["x509", "-noout", "-fingerprint", "-sha1"]);
    let output = utils::run_with_input(&mut x509, Some(&pem), timeout)?;
    if !output.status.success() {
        return Err(FingerprintError::NoFingerprint);
    }

    parse_fingerprint(&String::from_utf8_lossy(&output.stdout))
        .ok_or(FingerprintError::NoFingerprint)
}

/// First PEM certificate block in `s_client` output, markers included.
pub fn extract_pem(output: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut inside = false;

    for line in output.lines() {
        if line.contains(PEM_BEGIN) {
            inside = true;
            lines.clear();
        }
        if inside {
            lines.push(line);
            if line.contains(PEM_END) {
                return Some(lines.join("\n") + "\n");
            }
        }
    }
    None
}

/// Value of the `... Fingerprint=AA:BB:..` line printed by `openssl x509`.
pub fn parse_fingerprint(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("Fingerprint=")?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const S_CLIENT: &str = "\
CONNECTED(00000003)
---
Certificate chain
 0 s:CN = vpn.example.com
   i:CN = Example CA
-----BEGIN CERTIFICATE-----
MIIBszCCAVmgAwIBAgIUleaf
-----END CERTIFICATE-----
 1 s:CN = Example CA
   i:CN = Example CA
-----BEGIN CERTIFICATE-----
MIIBrootcert
-----END CERTIFICATE-----
---
Server certificate
";

    #[test]
    fn test_extract_first_certificate() {
        let pem = extract_pem(S_CLIENT).unwrap();
        assert!(pem.starts_with(PEM_BEGIN));
        assert!(pem.contains("MIIBszCCAVmgAwIBAgIUleaf"));
        assert!(!pem.contains("MIIBrootcert"));
        assert!(pem.trim_end().ends_with(PEM_END));
    }

    #[test]
    fn test_extract_without_certificate() {
        assert_eq!(extract_pem("CONNECTED(00000003)\nerrno=111\n"), None);
    }

    #[test]
    fn test_extract_truncated_certificate() {
        assert_eq!(extract_pem("-----BEGIN CERTIFICATE-----\nMIIB\n"), None);
    }

    #[test]
    fn test_parse_fingerprint() {
        assert_eq!(
            parse_fingerprint("SHA1 Fingerprint=AB:CD:EF:01:23\n"),
            Some("AB:CD:EF:01:23".to_string())
        );
        // OpenSSL 3 spelling.
        assert_eq!(
            parse_fingerprint("sha1 Fingerprint=00:11\n"),
            Some("00:11".to_string())
        );
        assert_eq!(parse_fingerprint("unable to load certificate\n"), None);
        assert_eq!(parse_fingerprint("SHA1 Fingerprint=\n"), None);
    }
}
