//! Framed, checksummed snapshot files.
//!
//! File layout:
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crc32fast::Hasher;
use tracing::debug;

use super::NetworkSnapshot;
use crate::error::SnapshotError;

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Largest frame accepted when decoding.
const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

/// Magic bytes identifying a snapshot file.
pub const MAGIC: [u8; 4] = *b"CDST";

/// Serializes a snapshot into one checksummed frame.
///
/// # Errors
///
/// Returns an error if serialization fails or the payload is too large to
/// frame.
pub fn encode(snapshot: &NetworkSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let data = serde_json::to_vec(snapshot).map_err(|e| SnapshotError::Serialization {
        message: e.to_string(),
    })?;
    let len = u32::try_from(data.len()).map_err(|_| SnapshotError::Serialization {
        message: format!("snapshot of {} bytes does not fit a frame", data.len()),
    })?;

    let mut hasher = Hasher::new();
    hasher.update(&data);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Reads one frame and deserializes the snapshot in it.
///
/// # Errors
///
/// Returns an error if the frame is truncated, oversized, fails its
/// checksum, or does not hold a valid snapshot.
pub fn decode(reader: &mut impl Read) -> Result<NetworkSnapshot, SnapshotError> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version[0],
            expected: CODEC_VERSION,
        });
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(SnapshotError::Corrupt {
            reason: format!("frame size {len} exceeds maximum {MAX_FRAME_SIZE}"),
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let mut hasher = Hasher::new();
    hasher.update(&data);
    let computed_crc = hasher.finalize();
    if stored_crc != computed_crc {
        return Err(SnapshotError::Corrupt {
            reason: format!("CRC mismatch: stored={stored_crc:08x}, computed={computed_crc:08x}"),
        });
    }

    serde_json::from_slice(&data).map_err(|e| SnapshotError::Corrupt {
        reason: format!("deserialization failed: {e}"),
    })
}

/// Writes the file header.
pub fn write_header(writer: &mut impl Write) -> Result<(), SnapshotError> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])?;
    Ok(())
}

/// Reads and checks the file header. Returns the file's codec version.
pub fn read_header(reader: &mut impl Read) -> Result<u8, SnapshotError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SnapshotError::Corrupt {
            reason: format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}"),
        });
    }
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version[0],
            expected: CODEC_VERSION,
        });
    }
    Ok(version[0])
}

/// Writes `snapshot` to `path`.
///
/// The file is written next to `path` first and renamed into place once it
/// is synced, so a crash never leaves a half-written snapshot behind.
///
/// # Errors
///
/// Returns an error if encoding or any file operation fails.
pub fn save(path: impl AsRef<Path>, snapshot: &NetworkSnapshot) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let frame = encode(snapshot)?;
    let temp_path = path.with_extension("snap.tmp");
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        write_header(&mut writer)?;
        writer.write_all(&frame)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), bytes = frame.len(), graphs = snapshot.graphs.len(), "saved snapshot");
    Ok(())
}

/// Reads a snapshot from `path` and validates it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is damaged, or holds a
/// snapshot that fails [`NetworkSnapshot::validate`].
pub fn load(path: impl AsRef<Path>) -> Result<NetworkSnapshot, SnapshotError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader)?;
    let snapshot = decode(&mut reader)?;
    snapshot.validate()?;
    debug!(path = %path.display(), graphs = snapshot.graphs.len(), jobs = snapshot.jobs.len(), "loaded snapshot");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkGraphSettings, NetworkLimits};
    use crate::snapshot::SNAPSHOT_VERSION;
    use crate::station::StationRegistry;
    use crate::time::Date;
    use std::io::Cursor;

    fn snapshot() -> NetworkSnapshot {
        NetworkSnapshot {
            version: SNAPSHOT_VERSION,
            date: Date::from_days(12),
            settings: LinkGraphSettings::default(),
            limits: NetworkLimits::default(),
            graphs: Vec::new(),
            stations: StationRegistry::new(),
            queue: Vec::new(),
            jobs: Vec::new(),
        }
    }

    #[test]
    fn test_frame_roundtrip() {
        let snap = snapshot();
        let frame = encode(&snap).unwrap();
        let back = decode(&mut Cursor::new(frame)).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_detects_corruption() {
        let mut frame = encode(&snapshot()).unwrap();
        frame[10] ^= 0xFF;
        let err = decode(&mut Cursor::new(frame)).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { .. }));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut bad = vec![CODEC_VERSION];
        bad.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = decode(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_truncated_frame_is_io_error() {
        let frame = encode(&snapshot()).unwrap();
        let err = decode(&mut Cursor::new(&frame[..frame.len() - 2])).unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn test_header_roundtrip() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), CODEC_VERSION);

        let err = read_header(&mut Cursor::new(b"PNG!\x01".to_vec())).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.snap");
        save(&path, &snapshot()).unwrap();
        assert_eq!(load(&path).unwrap(), snapshot());
        assert!(!path.with_extension("snap.tmp").exists());
    }
}
