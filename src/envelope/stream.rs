// ABOUTME: Async envelope reading and writing over tokio streams
// ABOUTME: Mirrors the blocking codec for use on network connections

use std::io::Write;

use memmap2::Mmap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::error::Result;
use super::{
    check_trailer, decode_header, decode_meta, Envelope, Payload, DEFAULT_MMAP_THRESHOLD,
    HEADER_LEN,
};

const SPILL_CHUNK: usize = 64 * 1024;

impl Envelope {
    pub async fn read_async<R>(reader: &mut R) -> Result<Envelope>
    where
        R: AsyncRead + Unpin,
    {
        Self::read_async_with_threshold(reader, DEFAULT_MMAP_THRESHOLD).await
    }

    /// Async counterpart of [`Envelope::read_with_threshold`]; payloads at or
    /// above `threshold` are spilled to a temp file and memory-mapped.
    pub async fn read_async_with_threshold<R>(reader: &mut R, threshold: u64) -> Result<Envelope>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).await?;
        let (meta_len, data_len) = decode_header(&header)?;

        let mut meta_bytes = vec![0u8; meta_len as usize];
        reader.read_exact(&mut meta_bytes).await?;
        let meta = decode_meta(&meta_bytes)?;

        let payload = if u64::from(data_len) < threshold {
            let mut bytes = vec![0u8; data_len as usize];
            reader.read_exact(&mut bytes).await?;
            Payload::Bytes(bytes)
        } else {
            Payload::Mapped(spill_async(reader, u64::from(data_len)).await?)
        };

        let mut trailer = [0u8; 2];
        reader.read_exact(&mut trailer).await?;
        check_trailer(trailer)?;

        Ok(Envelope::new(meta, payload))
    }

    pub async fn write_async<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        trace!(total_len = bytes.len(), "envelope written to stream");
        Ok(())
    }
}

async fn spill_async<R>(reader: &mut R, data_len: u64) -> Result<Mmap>
where
    R: AsyncRead + Unpin,
{
    let mut file = tempfile::tempfile()?;
    let mut remaining = data_len;
    let mut chunk = vec![0u8; SPILL_CHUNK];
    while remaining > 0 {
        let want = remaining.min(SPILL_CHUNK as u64) as usize;
        reader.read_exact(&mut chunk[..want]).await?;
        file.write_all(&chunk[..want])?;
        remaining -= want as u64;
    }
    file.flush()?;
    trace!(data_len, "envelope payload spilled to temp file");
    // Safety: the temp file is owned by this call and never written again.
    Ok(unsafe { Mmap::map(&file)? })
}
