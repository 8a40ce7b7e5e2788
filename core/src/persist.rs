use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// `{"documents": .., "index": .., "idf": ..}`
    #[default]
    Json,
    Bincode,
}

impl SnapshotFormat {
    fn file_name(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "index.json",
            SnapshotFormat::Bincode => "index.bin",
        }
    }
}

impl std::str::FromStr for SnapshotFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "bincode" | "bin" => Ok(SnapshotFormat::Bincode),
            other => Err(Error::InvalidArgument(format!("unknown snapshot format {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    pub format: SnapshotFormat,
}

impl MetaFile {
    pub fn for_snapshot(snapshot: &Snapshot, format: SnapshotFormat) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            num_docs: snapshot.num_docs() as u32,
            num_terms: snapshot.num_terms() as u32,
            created_at,
            version: FORMAT_VERSION,
            format,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn snapshot(&self, format: SnapshotFormat) -> PathBuf { self.root.join(format.file_name()) }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn encode(snapshot: &Snapshot, format: SnapshotFormat) -> Result<Vec<u8>> {
    match format {
        SnapshotFormat::Json => serde_json::to_vec(snapshot).map_err(|e| Error::Encode(e.to_string())),
        SnapshotFormat::Bincode => bincode::serialize(snapshot).map_err(|e| Error::Encode(e.to_string())),
    }
}

/// Decode and validate. Never returns a snapshot that failed [`Snapshot::validate`].
pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Snapshot> {
    let snapshot: Snapshot = match format {
        SnapshotFormat::Json => serde_json::from_slice(bytes)?,
        SnapshotFormat::Bincode => bincode::deserialize(bytes)?,
    };
    snapshot.validate()?;
    Ok(snapshot)
}

/// Write `bytes` next to `path` and rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta).map_err(|e| Error::Encode(e.to_string()))?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = fs::read_to_string(paths.meta())?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion { found: meta.version, expected: FORMAT_VERSION });
    }
    Ok(meta)
}

/// Persist the snapshot, then its meta file. Returns the meta that was written.
pub fn save_snapshot(paths: &IndexPaths, snapshot: &Snapshot, format: SnapshotFormat) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let bytes = encode(snapshot, format)?;
    write_atomic(&paths.snapshot(format), &bytes)?;
    let meta = MetaFile::for_snapshot(snapshot, format);
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), ?format, bytes = bytes.len(), "saved index snapshot");
    Ok(meta)
}

/// Load the snapshot named by `meta.json`, checking it against the meta counts.
pub fn load_snapshot(paths: &IndexPaths) -> Result<(Snapshot, MetaFile)> {
    let meta = load_meta(paths)?;
    let bytes = fs::read(paths.snapshot(meta.format))?;
    let snapshot = decode(&bytes, meta.format)?;
    if snapshot.num_docs() != meta.num_docs as usize || snapshot.num_terms() != meta.num_terms as usize {
        return Err(Error::Corrupt(format!(
            "meta.json expects {} documents and {} terms, snapshot has {} and {}",
            meta.num_docs,
            meta.num_terms,
            snapshot.num_docs(),
            snapshot.num_terms()
        )));
    }
    tracing::debug!(root = %paths.root.display(), num_docs = meta.num_docs, "loaded index snapshot");
    Ok((snapshot, meta))
}
