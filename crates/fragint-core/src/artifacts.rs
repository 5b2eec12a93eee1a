//! Local model files and their integrity.
//!
//! Every model file is checked against a known SHA-1 digest before it is handed
//! out. A file without a known digest is never accepted. Missing files are
//! downloaded into the cache directory; a download lands in a `.part` file and
//! is only moved into place once its digest matches.
use log::{debug, info, warn};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use std::{env, fmt};

use crate::config::{DEFAULT_MODEL_URL, KNOWN_MODEL_HASHES};
use crate::error::{FragintError, Result};

/// Environment variable overriding the model cache directory.
pub const MODEL_DIR_ENV: &str = "FRAGINT_MODEL_DIR";

const CHUNK_SIZE: usize = 16 * 1024;

/// Upper bound for one model download, connection and body included.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Absent,
    Downloading,
    Verified,
    Corrupt,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactState::Absent => "absent",
            ArtifactState::Downloading => "downloading",
            ArtifactState::Verified => "verified",
            ArtifactState::Corrupt => "corrupt",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub logical_name: String,
    pub local_path: PathBuf,
    pub expected_hash: String,
}

/// Resolves logical model names to verified files in a cache directory.
///
/// Calls for the same artifact are serialized by a per-artifact lock, so two
/// threads never download or verify the same file at once. Different
/// artifacts proceed independently.
#[derive(Debug)]
pub struct ModelArtifactManager {
    cache_dir: PathBuf,
    base_url: String,
    timeout: Duration,
    expected_hashes: HashMap<String, String>,
    states: Mutex<HashMap<String, Arc<Mutex<ArtifactState>>>>,
}

impl ModelArtifactManager {
    /// Manager over `cache_dir` knowing the digests of all published models.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            base_url: DEFAULT_MODEL_URL.to_string(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            expected_hashes: KNOWN_MODEL_HASHES
                .iter()
                .map(|(name, hash)| (name.to_string(), hash.to_string()))
                .collect(),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_cache_dir() -> Self {
        Self::new(default_cache_dir())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register (or replace) the expected digest of a model file.
    pub fn with_expected_hash(mut self, name: impl Into<String>, hash: impl Into<String>) -> Self {
        self.expected_hashes
            .insert(name.into(), hash.into().to_lowercase());
        self
    }

    pub fn add_expected_hashes<I, K, V>(&mut self, hashes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, hash) in hashes {
            self.expected_hashes
                .insert(name.into(), hash.into().to_lowercase());
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Describe an artifact; fails for names without a known digest.
    pub fn artifact(&self, logical_name: &str) -> Result<ModelArtifact> {
        let expected_hash = self.expected_hashes.get(logical_name).ok_or_else(|| {
            FragintError::invalid_model(logical_name, "no known digest for this model file")
        })?;
        Ok(ModelArtifact {
            logical_name: logical_name.to_string(),
            local_path: self.cache_dir.join(logical_name),
            expected_hash: expected_hash.clone(),
        })
    }

    /// Last known state of an artifact in this manager.
    pub fn state(&self, logical_name: &str) -> ArtifactState {
        let slot = self.slot(logical_name);
        let state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *state
    }

    fn slot(&self, logical_name: &str) -> Arc<Mutex<ArtifactState>> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            states
                .entry(logical_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ArtifactState::Absent))),
        )
    }

    /// Make sure the model file is on disk and matches its digest; return its path.
    ///
    /// Once verified, later calls only check that the file still exists.
    pub fn ensure_present(&self, logical_name: &str) -> Result<PathBuf> {
        let artifact = self.artifact(logical_name)?;
        let slot = self.slot(logical_name);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if *state == ArtifactState::Verified && artifact.local_path.is_file() {
            return Ok(artifact.local_path);
        }

        if artifact.local_path.is_file() {
            debug!(
                "Verifying cached model {} at {}",
                logical_name,
                artifact.local_path.display()
            );
            return match verify(&artifact, &artifact.local_path) {
                Ok(()) => {
                    *state = ArtifactState::Verified;
                    Ok(artifact.local_path)
                }
                Err(e) => {
                    warn!("Cached model {} failed verification: {}", logical_name, e);
                    *state = ArtifactState::Corrupt;
                    Err(e)
                }
            };
        }

        *state = ArtifactState::Downloading;
        match self.download(&artifact) {
            Ok(()) => {
                *state = ArtifactState::Verified;
                Ok(artifact.local_path)
            }
            Err(e) => {
                *state = match e {
                    FragintError::InvalidModel { .. } => ArtifactState::Corrupt,
                    _ => ArtifactState::Absent,
                };
                Err(e)
            }
        }
    }

    fn download(&self, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            artifact.logical_name
        );
        let part_path = self
            .cache_dir
            .join(format!("{}.part", artifact.logical_name));
        let download_error = |reason: String| FragintError::Download {
            name: artifact.logical_name.clone(),
            url: url.clone(),
            reason,
        };

        info!("Downloading model {} from {}", artifact.logical_name, url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| download_error(e.to_string()))?;
        let mut response = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;
        let written = match write_part(&mut response, &part_path) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part_path);
                return Err(download_error(e.to_string()));
            }
        };
        debug!("Downloaded {} bytes to {}", written, part_path.display());

        if let Err(e) = verify(artifact, &part_path) {
            let _ = fs::remove_file(&part_path);
            return Err(e);
        }
        fs::rename(&part_path, &artifact.local_path)?;
        info!(
            "Model {} stored at {}",
            artifact.logical_name,
            artifact.local_path.display()
        );
        Ok(())
    }
}

fn write_part(body: &mut impl Read, part_path: &Path) -> io::Result<u64> {
    let mut file = File::create(part_path)?;
    let written = io::copy(body, &mut file)?;
    file.sync_all()?;
    Ok(written)
}

fn verify(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    let digest = file_digest(path)?;
    if digest.eq_ignore_ascii_case(&artifact.expected_hash) {
        Ok(())
    } else {
        Err(FragintError::invalid_model(
            &artifact.logical_name,
            format!(
                "SHA-1 digest {} does not match expected {}",
                digest, artifact.expected_hash
            ),
        ))
    }
}

/// Hex SHA-1 digest of a file, read in fixed-size chunks.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Cache directory: `$FRAGINT_MODEL_DIR`, then `$HOME/.fragint/models`, then
/// `./.fragint_models`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = env::var(MODEL_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".fragint/models");
    }
    PathBuf::from("./.fragint_models")
}
