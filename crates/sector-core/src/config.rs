use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::block::BLOCK_SIZE;
use crate::error::{SectorError, SectorResult};

/// Top-level configuration (loaded from sectorcrypt.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    pub cipher: CipherConfig,
    pub sector: SectorLayout,
    pub mac: MacConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Block cipher: "kuznyechik", "aes128" or "aes256"
    pub algorithm: CipherKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorLayout {
    /// Sector size in bytes (multiple of 16, default: 512)
    pub size: usize,
    /// Default mode when none is given on the command line
    pub mode: ModeKind,
    /// Sector number assigned to the first sector of a file
    pub first_sector: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// CMAC tag size in bits: 64 or 128
    pub tag_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    #[default]
    Kuznyechik,
    Aes128,
    Aes256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Cmc,
    #[default]
    Xts,
    Heh,
    Dec,
}

impl ModeKind {
    /// Smallest sector, in blocks, the mode accepts.
    pub fn minimum_blocks(self) -> usize {
        match self {
            ModeKind::Cmc | ModeKind::Heh => 2,
            ModeKind::Xts | ModeKind::Dec => 1,
        }
    }
}

impl Default for SectorLayout {
    fn default() -> Self {
        Self {
            size: 512,
            mode: ModeKind::default(),
            first_sector: 0,
        }
    }
}

impl Default for MacConfig {
    fn default() -> Self {
        Self { tag_bits: 64 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SectorConfig {
    /// Read a TOML config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> SectorResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: SectorConfig = toml::from_str(&content)
            .map_err(|e| SectorError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SectorResult<()> {
        let size = self.sector.size;
        if size == 0 || size % BLOCK_SIZE != 0 {
            return Err(SectorError::Config(format!(
                "sector.size {size} is not a non-zero multiple of {BLOCK_SIZE}"
            )));
        }
        let minimum = self.sector.mode.minimum_blocks() * BLOCK_SIZE;
        if size < minimum {
            return Err(SectorError::Config(format!(
                "sector.size {size} is below the {minimum}-byte minimum for {}",
                self.sector.mode
            )));
        }
        if !matches!(self.mac.tag_bits, 64 | 128) {
            return Err(SectorError::InvalidTagSize(self.mac.tag_bits));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(SectorError::Config(format!(
                "log.format '{}' is not one of json, text",
                self.log.format
            )));
        }
        Ok(())
    }
}

// ── Names used on the command line and in TOML ───────────────────────────────

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CipherKind::Kuznyechik => "kuznyechik",
            CipherKind::Aes128 => "aes128",
            CipherKind::Aes256 => "aes256",
        })
    }
}

impl FromStr for CipherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kuznyechik" => Ok(CipherKind::Kuznyechik),
            "aes128" => Ok(CipherKind::Aes128),
            "aes256" => Ok(CipherKind::Aes256),
            other => Err(format!(
                "unknown cipher '{other}' (expected kuznyechik, aes128 or aes256)"
            )),
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModeKind::Cmc => "cmc",
            ModeKind::Xts => "xts",
            ModeKind::Heh => "heh",
            ModeKind::Dec => "dec",
        })
    }
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cmc" => Ok(ModeKind::Cmc),
            "xts" => Ok(ModeKind::Xts),
            "heh" => Ok(ModeKind::Heh),
            "dec" => Ok(ModeKind::Dec),
            other => Err(format!("unknown mode '{other}' (expected cmc, xts, heh or dec)")),
        }
    }
}
