/*!
 * Claim storage
 *
 * The pipeline only needs two things from storage: an atomic batch insert that
 * assigns identities, and a grouped net-fee sum for the provider ranking. Both
 * backends here keep the whole claim set in one snapshot and commit a batch by
 * swapping that snapshot, so a failed insert leaves nothing behind.
 */

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data_types::{ProviderRankingEntry, ValidatedClaim};
use crate::ranking::aggregate_net_fee_by_provider;
use crate::{ClaimsError, Result};

/// Storage collaborator consumed by the batch processor and the ranking
pub trait ClaimStore: Send + Sync {
    /// Persist every claim or none of them, returning them with identities
    fn insert_batch(&self, claims: Vec<ValidatedClaim>) -> Result<Vec<ValidatedClaim>>;

    /// Summed net fee per provider, sorted descending, at most `limit` rows
    fn sum_net_fee_by_provider(&self, limit: usize) -> Result<Vec<ProviderRankingEntry>>;

    /// Every stored claim in insertion order
    fn all_claims(&self) -> Result<Vec<ValidatedClaim>>;

    /// Number of stored claims
    fn len(&self) -> Result<usize> {
        Ok(self.all_claims()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Stored claims plus the next identity to hand out
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreSnapshot {
    next_id: i64,
    claims: Vec<ValidatedClaim>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            claims: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    /// Assign identities and append, returning the persisted copies
    fn append(&mut self, claims: Vec<ValidatedClaim>) -> Vec<ValidatedClaim> {
        let persisted: Vec<ValidatedClaim> = claims
            .into_iter()
            .enumerate()
            .map(|(offset, claim)| claim.with_id(self.next_id + offset as i64))
            .collect();

        self.next_id += persisted.len() as i64;
        self.claims.extend(persisted.iter().cloned());
        persisted
    }
}

/// Claim store held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryClaimStore {
    state: RwLock<StoreSnapshot>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStore for InMemoryClaimStore {
    fn insert_batch(&self, claims: Vec<ValidatedClaim>) -> Result<Vec<ValidatedClaim>> {
        if claims.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self
            .state
            .write()
            .map_err(|_| ClaimsError::store("in-memory store lock poisoned"))?;
        Ok(state.append(claims))
    }

    fn sum_net_fee_by_provider(&self, limit: usize) -> Result<Vec<ProviderRankingEntry>> {
        let state = self
            .state
            .read()
            .map_err(|_| ClaimsError::store("in-memory store lock poisoned"))?;
        aggregate_net_fee_by_provider(&state.claims, limit)
    }

    fn all_claims(&self) -> Result<Vec<ValidatedClaim>> {
        let state = self
            .state
            .read()
            .map_err(|_| ClaimsError::store("in-memory store lock poisoned"))?;
        Ok(state.claims.clone())
    }
}

/// How long a writer waits for another writer's lock by default
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Claim store persisted as a single JSON file
///
/// Each batch is committed by writing a new snapshot to a temporary file in the
/// same directory and renaming it over the old one. Writers serialize on a
/// sibling `<store>.lock` file held from reading the snapshot until the rename,
/// so handles in different processes never drop each other's batches. Readers
/// take no lock and always see a whole snapshot.
#[derive(Debug)]
pub struct JsonFileClaimStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileClaimStore {
    /// Open (or prepare to create) a store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Set how long an insert waits for another writer before failing
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the writer lock file next to the store
    pub fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read_snapshot(&self) -> Result<StoreSnapshot> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let file = File::open(&self.path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ClaimsError::store_file(format!("Store file is not a valid claim snapshot: {}", e), self.path.clone())
        })
    }

    fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;
        Ok(())
    }
}

/// Exclusive writer lock, released when dropped
#[derive(Debug)]
struct StoreWriteLock {
    path: PathBuf,
}

impl StoreWriteLock {
    /// Create the lock file, retrying until `timeout` while another writer holds it
    fn acquire(lock_path: PathBuf, store_path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    let lock = Self { path: lock_path };
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(ClaimsError::store_file(
                            format!(
                                "Store is locked by another writer; if no ingest is running, remove {}",
                                lock_path.display()
                            ),
                            store_path.to_path_buf(),
                        ));
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for StoreWriteLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

impl ClaimStore for JsonFileClaimStore {
    fn insert_batch(&self, claims: Vec<ValidatedClaim>) -> Result<Vec<ValidatedClaim>> {
        if claims.is_empty() {
            return Ok(Vec::new());
        }
        let _lock = StoreWriteLock::acquire(self.lock_path(), &self.path, self.lock_timeout)?;

        let mut snapshot = self.read_snapshot()?;
        let persisted = snapshot.append(claims);
        self.write_snapshot(&snapshot)?;

        debug!(path = %self.path.display(), stored = snapshot.claims.len(), "store snapshot written");
        Ok(persisted)
    }

    fn sum_net_fee_by_provider(&self, limit: usize) -> Result<Vec<ProviderRankingEntry>> {
        let snapshot = self.read_snapshot()?;
        aggregate_net_fee_by_provider(&snapshot.claims, limit)
    }

    fn all_claims(&self) -> Result<Vec<ValidatedClaim>> {
        Ok(self.read_snapshot()?.claims)
    }
}
