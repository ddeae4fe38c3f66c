//! Chunk cache file format and disk I/O
//!
//! One file per evicted chunk:
//!
//! ```text
//! [0]      chunk id (i8)
//! [1..2]   voxel count (u16 LE)
//! then voxel count records of 34 bytes:
//!   [0..4]   texture id (5 ASCII bytes)
//!   [5..16]  position (3 x f32 LE)
//!   [17..32] color RGBA (4 x f32 LE)
//!   [33]     solid flag (0xFF solid / 0x00 fluid)
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3, Vec4};
use crate::voxel::grid::ChunkId;
use crate::voxel::voxel::{TextureId, VoxelRecord, TEXTURE_ID_LEN};

/// Header size in bytes
pub const HEADER_BYTES: usize = 3;

/// Size of one voxel record in bytes
pub const RECORD_BYTES: usize = 34;

const SOLID: u8 = 0xFF;
const FLUID: u8 = 0x00;

/// File name for a chunk. Negative ids get an `m` prefix: `chunk_m12.vxc`.
pub fn chunk_file_name(id: ChunkId) -> String {
    let id = id as i32;
    if id < 0 {
        format!("chunk_m{}.vxc", -id)
    } else {
        format!("chunk_{}.vxc", id)
    }
}

/// Get the file path for a chunk
pub fn chunk_path(base_dir: &Path, id: ChunkId) -> PathBuf {
    base_dir.join(chunk_file_name(id))
}

pub fn encode_header(id: ChunkId, voxel_count: u16) -> [u8; HEADER_BYTES] {
    let count = voxel_count.to_le_bytes();
    [id as u8, count[0], count[1]]
}

pub fn decode_header(bytes: &[u8]) -> Option<(ChunkId, u16)> {
    let header: [u8; HEADER_BYTES] = bytes.get(..HEADER_BYTES)?.try_into().ok()?;
    Some((header[0] as ChunkId, u16::from_le_bytes([header[1], header[2]])))
}

pub fn encode_record(record: &VoxelRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(record.texture.as_bytes());
    for v in record.position.to_array() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in record.color.to_array() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.push(if record.solid { SOLID } else { FLUID });
}

/// Decode one record. Any non-zero solid flag reads as solid.
pub fn decode_record(chunk: ChunkId, bytes: &[u8]) -> Result<VoxelRecord> {
    let corrupt = |reason: String| Error::CorruptCache { chunk, reason };
    if bytes.len() != RECORD_BYTES {
        return Err(corrupt(format!("record is {} bytes", bytes.len())));
    }

    let mut texture = [0u8; TEXTURE_ID_LEN];
    texture.copy_from_slice(&bytes[..TEXTURE_ID_LEN]);
    let texture = TextureId::from_bytes(texture).map_err(|e| corrupt(e.to_string()))?;

    let float_at = |i: usize| {
        let at = TEXTURE_ID_LEN + i * 4;
        f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };
    let position = Vec3::new(float_at(0), float_at(1), float_at(2));
    let color = Vec4::new(float_at(3), float_at(4), float_at(5), float_at(6));

    Ok(VoxelRecord::new(texture, position, color, bytes[RECORD_BYTES - 1] != FLUID))
}

/// Serialize header and records in one buffer.
pub fn encode_chunk(id: ChunkId, records: &[VoxelRecord]) -> Result<Vec<u8>> {
    let count = u16::try_from(records.len()).map_err(|_| Error::ChunkTooLarge {
        chunk: id,
        voxels: records.len(),
    })?;

    let mut out = Vec::with_capacity(HEADER_BYTES + records.len() * RECORD_BYTES);
    out.extend_from_slice(&encode_header(id, count));
    for record in records {
        encode_record(record, &mut out);
    }
    Ok(out)
}

/// Write a chunk file, returning its size. The file appears only once fully written.
pub fn write_chunk(base_dir: &Path, id: ChunkId, records: &[VoxelRecord]) -> Result<u64> {
    let bytes = encode_chunk(id, records)?;
    fs::create_dir_all(base_dir)?;

    let path = chunk_path(base_dir, id);
    let temp_path = path.with_extension("tmp");
    let written = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&temp_path, &path));

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(bytes.len() as u64)
}

/// Read and check the header of a chunk file.
pub fn read_header(path: &Path, id: ChunkId) -> Result<u16> {
    let mut header = [0u8; HEADER_BYTES];
    File::open(path)?.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::CorruptCache {
            chunk: id,
            reason: "short header".into(),
        },
        _ => Error::Io(e),
    })?;
    match decode_header(&header) {
        Some((file_id, count)) if file_id == id => Ok(count),
        Some((file_id, _)) => Err(Error::CorruptCache {
            chunk: id,
            reason: format!("header names chunk {}", file_id),
        }),
        None => Err(Error::CorruptCache {
            chunk: id,
            reason: "unreadable header".into(),
        }),
    }
}

/// Read `count` records starting at byte `offset`. Nothing is returned
/// unless every record reads and decodes.
pub fn read_records(path: &Path, id: ChunkId, offset: u64, count: usize) -> Result<Vec<VoxelRecord>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut bytes = vec![0u8; count * RECORD_BYTES];
    file.read_exact(&mut bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::CorruptCache {
            chunk: id,
            reason: format!("truncated at offset {}", offset),
        },
        _ => Error::Io(e),
    })?;

    bytes
        .chunks_exact(RECORD_BYTES)
        .map(|record| decode_record(id, record))
        .collect()
}

/// Delete a chunk file if present
pub fn delete_chunk(base_dir: &Path, id: ChunkId) -> Result<()> {
    let path = chunk_path(base_dir, id);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}
