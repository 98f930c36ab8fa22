//! Durable snapshot of built graphs, so restarts skip the ingestion pass.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::graph::{load_trip_records, GraphStore, IngestError};
use crate::surge::SurgeTable;
use crate::traits::SnapshotStore;

/// Bumped whenever the on-disk layout of [`Snapshot`] changes; older files
/// are discarded and rebuilt.
pub const SNAPSHOT_VERSION: u32 = 1;

/// What gets persisted: the built graphs together with the surge table they
/// were loaded alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    version: u32,
    pub graphs: GraphStore,
    pub surge: SurgeTable,
}

impl Snapshot {
    pub fn new(graphs: GraphStore, surge: SurgeTable) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            graphs,
            surge,
        }
    }
}

#[derive(Debug, Error)]
enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("snapshot version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// One snapshot file per deployment, written atomically.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    pub path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<Snapshot, SnapshotError> {
        let file = File::open(&self.path)?;
        let snapshot: Snapshot = bincode::deserialize_from(BufReader::new(file))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        bincode::serialize_into(&mut writer, snapshot)?;
        writer.flush()?;
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<Snapshot> {
        if !self.path.exists() {
            return None;
        }
        match self.read() {
            Ok(snapshot) => {
                info!(path = %self.path.display(), cities = snapshot.graphs.city_count(), "loaded graph snapshot");
                Some(snapshot)
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "discarding unreadable snapshot, rebuilding from source");
                None
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) {
        match self.write(snapshot) {
            Ok(()) => info!(path = %self.path.display(), "graph snapshot saved"),
            Err(err) => warn!(path = %self.path.display(), %err, "failed to save graph snapshot"),
        }
    }
}

/// Load graphs and surge data through the snapshot tier.
///
/// Snapshot hits skip ingestion entirely; misses (or `force_rebuild`)
/// rebuild from the CSVs and refresh the snapshot. Only source-data errors
/// propagate — snapshot trouble always falls back to a rebuild.
pub fn load_or_build(
    trips_path: impl AsRef<Path>,
    surge_path: impl AsRef<Path>,
    store: Option<&dyn SnapshotStore>,
    force_rebuild: bool,
) -> Result<(GraphStore, SurgeTable), IngestError> {
    if !force_rebuild {
        if let Some(snapshot) = store.and_then(|store| store.load()) {
            return Ok((snapshot.graphs, snapshot.surge));
        }
    }

    info!("building mobility graphs from trip records");
    let records = load_trip_records(trips_path)?;
    let graphs = GraphStore::build(&records);
    let surge = SurgeTable::from_csv_path(surge_path)?;

    if let Some(store) = store {
        store.save(&Snapshot::new(graphs.clone(), surge.clone()));
    }
    Ok((graphs, surge))
}
