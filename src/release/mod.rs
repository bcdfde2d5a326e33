//! Upstream release metadata and target architectures.

pub mod version;

pub use version::{compare_versions, determine_latest, ReleaseVersion};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Target platform an image is built for, named the way Alpine names its rootfs archives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86_64,
    Aarch64,
    Armv7,
    Armhf,
    X86,
    Ppc64le,
    S390x,
    Riscv64,
}

impl Architecture {
    pub const ALL: [Architecture; 8] = [
        Architecture::X86_64,
        Architecture::Aarch64,
        Architecture::Armv7,
        Architecture::Armhf,
        Architecture::X86,
        Architecture::Ppc64le,
        Architecture::S390x,
        Architecture::Riscv64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
            Architecture::Armv7 => "armv7",
            Architecture::Armhf => "armhf",
            Architecture::X86 => "x86",
            Architecture::Ppc64le => "ppc64le",
            Architecture::S390x => "s390x",
            Architecture::Riscv64 => "riscv64",
        }
    }

    /// OCI platform string passed to `--platform`.
    pub fn docker_platform(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "linux/amd64",
            Architecture::Aarch64 => "linux/arm64",
            Architecture::Armv7 => "linux/arm/v7",
            Architecture::Armhf => "linux/arm/v6",
            Architecture::X86 => "linux/386",
            Architecture::Ppc64le => "linux/ppc64le",
            Architecture::S390x => "linux/s390x",
            Architecture::Riscv64 => "linux/riscv64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Architecture::ALL
            .iter()
            .copied()
            .find(|arch| arch.as_str() == needle)
            .ok_or_else(|| {
                format!(
                    "Unknown architecture: {}. Valid options: {}",
                    s,
                    Architecture::ALL
                        .iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// One upstream release as discovered by the scraper. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub end_of_life_date: NaiveDate,
    /// Rootfs archive URL per architecture.
    pub downloads: BTreeMap<Architecture, String>,
}

impl Release {
    pub fn new(version: impl Into<String>, end_of_life_date: NaiveDate) -> Self {
        Self {
            version: version.into(),
            end_of_life_date,
            downloads: BTreeMap::new(),
        }
    }

    pub fn with_download(mut self, arch: Architecture, url: impl Into<String>) -> Self {
        self.downloads.insert(arch, url.into());
        self
    }

    /// Still supported on `today` (EOL strictly in the future).
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.end_of_life_date > today
    }
}

/// Keep only releases whose end-of-support date is after `today`.
pub fn active_releases(releases: Vec<Release>, today: NaiveDate) -> Vec<Release> {
    releases
        .into_iter()
        .filter(|release| release.is_active(today))
        .collect()
}

/// Minirootfs archive file name for a release/architecture pair.
pub fn rootfs_file_name(version: &str, arch: Architecture) -> String {
    format!("alpine-minirootfs-{}-{}.tar.gz", version, arch)
}

/// Mirror URL of the minirootfs archive for a release/architecture pair.
pub fn rootfs_url(mirror: &str, version: &str, arch: Architecture) -> String {
    format!(
        "{}/v{}/releases/{}/{}",
        mirror.trim_end_matches('/'),
        ReleaseVersion::parse(version).branch(),
        arch,
        rootfs_file_name(version, arch)
    )
}
