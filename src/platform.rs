//! Host platform detection and the pinned usql release table.
//!
//! The table is an exhaustive `match` over `(Os, Arch)`, so adding an
//! enumerated platform without deciding its asset is a compile error.

use std::fmt;

use crate::error::{GateError, Result};

/// usql release the installer downloads.
pub const USQL_VERSION: &str = "0.19.25";

const RELEASE_BASE_URL: &str = "https://github.com/xo/usql/releases/download";

/// Operating systems usql-gate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
}

impl Os {
    /// Parses a `std::env::consts::OS` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Name used in usql release asset file names.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "darwin",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// CPU architectures usql-gate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    Arm,
}

impl Arch {
    /// Parses a `std::env::consts::ARCH` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "x86_64" => Some(Self::X86_64),
            "aarch64" => Some(Self::Aarch64),
            "arm" => Some(Self::Arm),
            _ => None,
        }
    }

    /// Name used in usql release asset file names.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
            Self::Arm => "arm",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => write!(f, "x86_64"),
            Self::Aarch64 => write!(f, "aarch64"),
            Self::Arm => write!(f, "arm"),
        }
    }
}

/// Archive container used by a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarBz2 => "tar.bz2",
            Self::Zip => "zip",
        }
    }
}

/// The (OS, architecture) pair of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformDescriptor {
    pub os: Os,
    pub arch: Arch,
}

/// Where to fetch usql for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub url: String,
    pub format: ArchiveFormat,
}

impl PlatformDescriptor {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Reads the platform of the running process.
    pub fn detect() -> Result<Self> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Builds a descriptor from OS/arch names, checking the architecture first.
    pub fn from_names(os: &str, arch: &str) -> Result<Self> {
        let arch =
            Arch::parse(arch).ok_or_else(|| GateError::UnsupportedArchitecture(arch.to_string()))?;
        let os =
            Os::parse(os).ok_or_else(|| GateError::UnsupportedOperatingSystem(os.to_string()))?;
        Ok(Self { os, arch })
    }

    /// File name of the usql executable on this platform.
    pub fn binary_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "usql.exe",
            Os::Linux | Os::MacOs => "usql",
        }
    }

    /// Looks up the pinned release asset for this platform.
    ///
    /// Platforms upstream does not publish a build for are reported as
    /// unsupported architectures rather than mapped to a neighbouring asset.
    pub fn release_asset(&self) -> Result<ReleaseAsset> {
        let format = match (self.os, self.arch) {
            (Os::Linux, Arch::X86_64 | Arch::Aarch64 | Arch::Arm) => ArchiveFormat::TarBz2,
            (Os::MacOs, Arch::X86_64 | Arch::Aarch64) => ArchiveFormat::TarBz2,
            (Os::Windows, Arch::X86_64) => ArchiveFormat::Zip,
            (Os::MacOs, Arch::Arm) | (Os::Windows, Arch::Aarch64 | Arch::Arm) => {
                return Err(GateError::UnsupportedArchitecture(format!(
                    "{} on {}",
                    self.arch, self.os
                )));
            }
        };

        let file = format!(
            "usql-{USQL_VERSION}-{}-{}.{}",
            self.os.asset_name(),
            self.arch.asset_name(),
            format.extension()
        );

        Ok(ReleaseAsset {
            url: format!("{RELEASE_BASE_URL}/v{USQL_VERSION}/{file}"),
            format,
        })
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
