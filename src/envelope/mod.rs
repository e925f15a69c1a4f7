// ABOUTME: Binary envelope framing pairing a JSON metadata block with a raw payload
// ABOUTME: Large payloads are spilled to disk and memory-mapped instead of buffered

pub mod error;
pub mod stream;

pub use error::{EnvelopeError, Result};

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use memmap2::Mmap;
use tracing::trace;

use crate::meta::Meta;

pub(crate) const MAGIC: [u8; 2] = *b"#~";
pub(crate) const FORMAT_VERSION: [u8; 4] = *b"DF02";
pub(crate) const META_TYPE_JSON: [u8; 2] = *b"..";
pub(crate) const TRAILER: [u8; 2] = *b"~#";
pub(crate) const HEADER_LEN: usize = 16;

/// Payloads at or above this size are not buffered in memory on read;
/// they are spilled to an anonymous temp file and memory-mapped.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 128 * 1024 * 1024;

/// Payload bytes of an envelope, either owned in memory or memory-mapped
/// from a file.
pub enum Payload {
    Bytes(Vec<u8>),
    Mapped(Mmap),
}

impl Payload {
    pub fn empty() -> Self {
        Payload::Bytes(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Mapped(map) => map,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Mapped(map) => f.debug_tuple("Mapped").field(&map.len()).finish(),
        }
    }
}

/// A framed metadata-plus-payload message.
///
/// Wire layout: `#~` magic, `DF02` version, a two-byte metadata type
/// marker, big-endian `u32` metadata and payload lengths, the UTF-8 JSON
/// metadata, the raw payload, and a `~#` trailer. Any framing violation is
/// fatal; readers never resynchronize mid-stream.
#[derive(Debug, PartialEq)]
pub struct Envelope {
    meta: Meta,
    payload: Payload,
}

impl Envelope {
    pub fn new(meta: Meta, payload: impl Into<Payload>) -> Self {
        Self {
            meta,
            payload: payload.into(),
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(self) -> (Meta, Payload) {
        (self.meta, self.payload)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let meta_bytes = serde_json::to_vec(&self.meta)?;
        let header = encode_header(meta_bytes.len(), self.payload.len())?;

        writer.write_all(&header)?;
        writer.write_all(&meta_bytes)?;
        writer.write_all(self.payload.as_bytes())?;
        writer.write_all(&TRAILER)?;
        writer.flush()?;

        trace!(
            meta_len = meta_bytes.len(),
            data_len = self.payload.len(),
            "envelope written"
        );
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.payload.len() + TRAILER.len());
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Envelope> {
        Self::read_with_threshold(reader, DEFAULT_MMAP_THRESHOLD)
    }

    /// Read one envelope, spilling the payload to a temp file and mapping it
    /// when it is at least `threshold` bytes.
    pub fn read_with_threshold<R: Read>(reader: &mut R, threshold: u64) -> Result<Envelope> {
        let (meta, data_len) = read_prefix(reader)?;

        let payload = if u64::from(data_len) < threshold {
            let mut bytes = vec![0u8; data_len as usize];
            reader.read_exact(&mut bytes)?;
            Payload::Bytes(bytes)
        } else {
            Payload::Mapped(spill_to_mmap(reader, u64::from(data_len))?)
        };

        read_trailer(reader)?;
        Ok(Envelope { meta, payload })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Envelope> {
        let mut reader = bytes;
        // Already in memory, never spill.
        Self::read_with_threshold(&mut reader, u64::MAX)
    }

    pub fn read_file(file: &mut File) -> Result<Envelope> {
        Self::read_file_with_threshold(file, DEFAULT_MMAP_THRESHOLD)
    }

    /// Read one envelope from a seekable file, mapping the payload region in
    /// place when it is at least `threshold` bytes.
    pub fn read_file_with_threshold(file: &mut File, threshold: u64) -> Result<Envelope> {
        let (meta, data_len) = read_prefix(file)?;

        let payload = if u64::from(data_len) < threshold {
            let mut bytes = vec![0u8; data_len as usize];
            file.read_exact(&mut bytes)?;
            Payload::Bytes(bytes)
        } else {
            let offset = file.stream_position()?;
            // Safety: the mapping is read-only over a region this process
            // does not write while the payload is alive.
            let map = unsafe {
                memmap2::MmapOptions::new()
                    .offset(offset)
                    .len(data_len as usize)
                    .map(&*file)?
            };
            file.seek(SeekFrom::Start(offset + u64::from(data_len)))?;
            Payload::Mapped(map)
        };

        read_trailer(file)?;
        Ok(Envelope { meta, payload })
    }
}

fn encode_header(meta_len: usize, data_len: usize) -> Result<[u8; HEADER_LEN]> {
    let meta_len = u32::try_from(meta_len).map_err(|_| EnvelopeError::Oversize(meta_len))?;
    let data_len = u32::try_from(data_len).map_err(|_| EnvelopeError::Oversize(data_len))?;

    let mut header = [0u8; HEADER_LEN];
    header[0..2].copy_from_slice(&MAGIC);
    header[2..6].copy_from_slice(&FORMAT_VERSION);
    header[6..8].copy_from_slice(&META_TYPE_JSON);
    header[8..12].copy_from_slice(&meta_len.to_be_bytes());
    header[12..16].copy_from_slice(&data_len.to_be_bytes());
    Ok(header)
}

/// Validate the fixed header and return the section lengths.
pub(crate) fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(u32, u32)> {
    if header[0..2] != MAGIC {
        return Err(EnvelopeError::BadMagic {
            found: [header[0], header[1]],
        });
    }
    if header[2..6] != FORMAT_VERSION {
        return Err(EnvelopeError::BadVersion {
            found: [header[2], header[3], header[4], header[5]],
        });
    }
    // header[6..8] is the metadata type marker; JSON is the only supported
    // encoding and the marker is not interpreted further.
    let meta_len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let data_len = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
    Ok((meta_len, data_len))
}

pub(crate) fn decode_meta(bytes: &[u8]) -> Result<Meta> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn check_trailer(trailer: [u8; 2]) -> Result<()> {
    if trailer != TRAILER {
        return Err(EnvelopeError::BadTrailer { found: trailer });
    }
    Ok(())
}

fn read_prefix<R: Read>(reader: &mut R) -> Result<(Meta, u32)> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let (meta_len, data_len) = decode_header(&header)?;

    let mut meta_bytes = vec![0u8; meta_len as usize];
    reader.read_exact(&mut meta_bytes)?;
    Ok((decode_meta(&meta_bytes)?, data_len))
}

fn read_trailer<R: Read>(reader: &mut R) -> Result<()> {
    let mut trailer = [0u8; 2];
    reader.read_exact(&mut trailer)?;
    check_trailer(trailer)
}

fn spill_to_mmap<R: Read>(reader: &mut R, data_len: u64) -> Result<Mmap> {
    let mut file = tempfile::tempfile()?;
    let copied = std::io::copy(&mut reader.take(data_len), &mut file)?;
    if copied != data_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated envelope payload",
        )
        .into());
    }
    file.flush()?;
    trace!(data_len, "envelope payload spilled to temp file");
    // Safety: the temp file is owned by this call and never written again.
    Ok(unsafe { Mmap::map(&file)? })
}
