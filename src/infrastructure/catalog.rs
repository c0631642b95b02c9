//! Catalog of tracked ASINs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, warn};

use crate::shared::errors::CatalogError;
use crate::shared::types::Asin;

/// On-disk catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_discount_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_only: Option<bool>,
    #[serde(default)]
    pub tracking_asins: Vec<String>,
}

/// Ordered, de-duplicated set of ASINs to track plus catalog-level settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub asins: Vec<Asin>,
    pub min_discount_percent: Option<u8>,
    pub amazon_only: Option<bool>,
}

impl Catalog {
    pub fn new(asins: Vec<Asin>) -> Self {
        Self {
            asins,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.asins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asins.is_empty()
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut seen = HashSet::new();
        let mut asins = Vec::with_capacity(file.tracking_asins.len());
        for raw in &file.tracking_asins {
            if raw.trim().is_empty() {
                continue;
            }
            match raw.parse::<Asin>() {
                Ok(asin) => {
                    if seen.insert(asin.clone()) {
                        asins.push(asin);
                    } else {
                        warn!(asin = %asin, "Duplicate ASIN in catalog ignored");
                    }
                }
                Err(e) => warn!(entry = %raw, error = %e, "Invalid catalog entry ignored"),
            }
        }

        let min_discount_percent = file
            .min_discount_percent
            .map(|pct| pct.clamp(0.0, 100.0).ceil() as u8);

        Self {
            asins,
            min_discount_percent,
            amazon_only: file.amazon_only,
        }
    }
}

/// JSON catalog stored on disk
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<CatalogFile, CatalogError> {
        let path_str = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CatalogError::NotFound(path_str.clone())
            } else {
                CatalogError::Io {
                    path: path_str.clone(),
                    source,
                }
            }
        })?;
        if content.trim().is_empty() {
            return Ok(CatalogFile::default());
        }
        serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
            path: path_str,
            source,
        })
    }

    /// Load the catalog. An empty catalog is an error: there is nothing to track.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let catalog = Catalog::from_file(self.read_file()?);
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        info!(path = %self.path.display(), asins = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Append ASINs not yet tracked, creating the catalog if needed.
    /// Returns the ASINs actually added.
    pub fn add(&self, candidates: &[Asin]) -> Result<Vec<Asin>, CatalogError> {
        let mut file = match self.read_file() {
            Ok(file) => file,
            Err(CatalogError::NotFound(_)) => CatalogFile::default(),
            Err(e) => return Err(e),
        };

        let mut known: HashSet<Asin> = file
            .tracking_asins
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();

        let mut added = Vec::new();
        for asin in candidates {
            if known.insert(asin.clone()) {
                info!(asin = %asin, "ASIN added to catalog");
                file.tracking_asins.push(asin.to_string());
                added.push(asin.clone());
            } else {
                info!(asin = %asin, "ASIN already tracked");
            }
        }

        if !added.is_empty() {
            self.write_file(&file)?;
        }
        Ok(added)
    }

    fn write_file(&self, file: &CatalogFile) -> Result<(), CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let json = serde_json::to_string_pretty(file).map_err(|source| CatalogError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Parse a comma separated list of ASINs, skipping blanks
pub fn parse_asin_list(list: &str) -> Vec<Asin> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(asin) => Some(asin),
            Err(e) => {
                warn!(entry = %s, error = %e, "Invalid ASIN ignored");
                None
            }
        })
        .collect()
}

/// Read one ASIN per line, ignoring blank lines and `#` comments
pub fn read_asin_lines(path: &Path) -> Result<Vec<Asin>, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.parse() {
            Ok(asin) => Some(asin),
            Err(e) => {
                warn!(entry = %line, error = %e, "Invalid ASIN ignored");
                None
            }
        })
        .collect())
}
