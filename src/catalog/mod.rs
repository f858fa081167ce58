// file: src/catalog/mod.rs
// version: 1.0.0
// guid: 91e17f59-d976-41dc-b962-bbeaa2a30b9b

//! Shell script catalog
//!
//! Pure builders that render the script for one installation step. Every
//! rendered script starts with `set -e` so the remote shell stops at the
//! first failing command. OS specific variants are selected with
//! [`OsFamily`]; every family must have a variant for every step, or an
//! explicit "nothing to do" (`None`) where the step is optional.

pub mod elastic;
pub mod kubernetes;

use crate::error::ProvisionError;
use crate::Result;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Supported target operating systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// RHEL 9 and rebuilds (Oracle Linux, Rocky, AlmaLinux)
    Rhel9,
    /// SUSE Linux Enterprise 15
    Sles15,
    /// Debian 12
    Debian12,
    /// VMware Photon OS 5
    Photon5,
}

impl OsFamily {
    pub const ALL: [OsFamily; 4] = [
        OsFamily::Rhel9,
        OsFamily::Sles15,
        OsFamily::Debian12,
        OsFamily::Photon5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Rhel9 => "rhel9",
            OsFamily::Sles15 => "sles15",
            OsFamily::Debian12 => "debian12",
            OsFamily::Photon5 => "photon5",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        OsFamily::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| ProvisionError::unsupported(format!("unsupported OS family: {}", s)))
    }
}

impl Serialize for OsFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Map `/etc/os-release` ID and VERSION_ID to a supported family.
///
/// Rules are checked in order; the first match wins.
pub fn detect_os_family(os_id: &str, version_id: &str) -> Result<OsFamily> {
    let major = parse_version_major(version_id);
    let id = os_id.trim().to_lowercase();

    let family = match id.as_str() {
        "rhel" | "ol" | "rocky" | "almalinux" if major >= 9 => Some(OsFamily::Rhel9),
        "sles" | "suse" if major >= 15 => Some(OsFamily::Sles15),
        "debian" if major >= 12 => Some(OsFamily::Debian12),
        "photon" if major >= 5 => Some(OsFamily::Photon5),
        _ => None,
    };

    family.ok_or_else(|| {
        ProvisionError::unsupported(format!("unsupported OS: {} {}", os_id, version_id))
    })
}

/// Integer before the first `.`; anything unparsable is 0
pub fn parse_version_major(version: &str) -> u32 {
    version
        .trim()
        .split('.')
        .next()
        .and_then(|major| major.trim().parse().ok())
        .unwrap_or(0)
}

/// Prefix a script body with `set -e`
pub(crate) fn script(body: &str) -> String {
    format!("set -e\n{}", body.trim())
}

/// Lines that write `content` to `path` through a quoted heredoc
pub(crate) fn heredoc(path: &str, content: &str) -> String {
    format!(
        "cat <<'CP_EOF' > {}\n{}\nCP_EOF",
        path,
        content.trim_end_matches('\n')
    )
}

/// Lines that load a secret into a shell variable without it touching argv
pub(crate) fn secret_variable(name: &str, value: &str) -> String {
    format!("{}=$(cat <<'CP_SECRET'\n{}\nCP_SECRET\n)", name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_os_family_rules() {
        assert_eq!(detect_os_family("debian", "12").unwrap(), OsFamily::Debian12);
        assert_eq!(detect_os_family("rocky", "9.3").unwrap(), OsFamily::Rhel9);
        assert_eq!(detect_os_family("OL", "9.4").unwrap(), OsFamily::Rhel9);
        assert_eq!(detect_os_family("almalinux", "10").unwrap(), OsFamily::Rhel9);
        assert_eq!(detect_os_family("sles", "15.5").unwrap(), OsFamily::Sles15);
        assert_eq!(detect_os_family("photon", "5.0").unwrap(), OsFamily::Photon5);
    }

    #[test]
    fn test_detect_os_family_below_threshold_is_unsupported() {
        let err = detect_os_family("rhel", "8").unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedEnvironment(_)));
        assert!(err.to_string().contains("rhel 8"));

        assert!(detect_os_family("debian", "11").is_err());
        assert!(detect_os_family("ubuntu", "24.04").is_err());
        assert!(detect_os_family("debian", "bookworm").is_err());
    }

    #[test]
    fn test_detect_os_family_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(detect_os_family("debian", "12").unwrap(), OsFamily::Debian12);
        }
    }

    #[test]
    fn test_parse_version_major() {
        assert_eq!(parse_version_major("9.3"), 9);
        assert_eq!(parse_version_major("12"), 12);
        assert_eq!(parse_version_major(""), 0);
        assert_eq!(parse_version_major("rolling"), 0);
    }

    #[test]
    fn test_os_family_round_trips_through_str() {
        for family in OsFamily::ALL {
            assert_eq!(family.as_str().parse::<OsFamily>().unwrap(), family);
        }
        let err = "arch".parse::<OsFamily>().unwrap_err();
        assert!(err.to_string().contains("arch"));
    }

    #[test]
    fn test_heredoc_and_secret_variable() {
        let doc = heredoc("/etc/x.conf", "a: 1\n");
        assert_eq!(doc, "cat <<'CP_EOF' > /etc/x.conf\na: 1\nCP_EOF");

        let secret = secret_variable("PW", "s3cr3t");
        assert!(secret.starts_with("PW=$(cat <<'CP_SECRET'"));
        assert!(secret.contains("\ns3cr3t\n"));
    }
}
