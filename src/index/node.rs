//! Compressed node codec.
//!
//! Every tree node is stored as an independent block:
//!
//! ```text
//! u32  uncompressed_size
//! u32  compressed_size
//! u8[compressed_size]   zlib(payload)
//! [ leaf only: u32 next_leaf_offset ]   // 0 if last
//! ```
//!
//! The codec reads and writes opaque payload bytes; the leaf/inner layout
//! inside the payload is the writer's and reader's business. The trailing
//! next-leaf link is written by the tree builder, not here, because only the
//! builder knows whether a node is a leaf.

use crate::error::{Error, Result};
use crate::utils::{read_u32_le, write_u32_le};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Seek, SeekFrom, Write};

/// Read and decompress the node block at `offset`.
///
/// On return the stream position sits just past the compressed payload, which
/// for leaf nodes is exactly where the next-leaf link lives.
pub fn read_node<R: Read + Seek>(reader: &mut R, offset: u32) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset as u64))?;

    let uncompressed_size = read_u32_le(reader)? as usize;
    let compressed_size = read_u32_le(reader)? as usize;

    let mut compressed = vec![0u8; compressed_size];
    reader.read_exact(&mut compressed)?;

    let mut payload = Vec::with_capacity(uncompressed_size);
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut payload)
        .map_err(|_| Error::DecompressError)?;

    if payload.len() != uncompressed_size {
        return Err(Error::DecompressError);
    }

    Ok(payload)
}

/// Compress `payload` and append it as a node block at the current position.
/// Returns the file offset of the block header.
pub fn write_node<W: Write + Seek>(writer: &mut W, payload: &[u8]) -> Result<u32> {
    let offset = writer.stream_position()? as u32;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|_| Error::CompressError)?;
    let compressed = encoder.finish().map_err(|_| Error::CompressError)?;

    write_u32_le(writer, payload.len() as u32)?;
    write_u32_le(writer, compressed.len() as u32)?;
    writer.write_all(&compressed)?;

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_node_roundtrip() {
        let payload = b"zero\0terminated\0strings and \x01\x02\x03 binary".to_vec();

        let mut file = Cursor::new(Vec::new());
        let offset = write_node(&mut file, &payload).unwrap();
        assert_eq!(offset, 0);

        let decoded = read_node(&mut file, offset).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_node_roundtrip_at_offset() {
        let mut file = Cursor::new(Vec::new());
        file.write_all(&[0xaa; 17]).unwrap();

        let offset = write_node(&mut file, b"second block").unwrap();
        assert_eq!(offset, 17);
        assert_eq!(read_node(&mut file, offset).unwrap(), b"second block");
    }

    #[test]
    fn test_position_after_read_is_past_payload() {
        let mut file = Cursor::new(Vec::new());
        let offset = write_node(&mut file, b"leaf payload").unwrap();
        let end = file.stream_position().unwrap();

        read_node(&mut file, offset).unwrap();
        assert_eq!(file.stream_position().unwrap(), end);
    }

    #[test]
    fn test_rejects_garbage_payload() {
        let mut file = Cursor::new(Vec::new());
        write_u32_le(&mut file, 10).unwrap();
        write_u32_le(&mut file, 4).unwrap();
        file.write_all(&[0xde, 0xad, 0xbe, 0xef]).unwrap();

        assert!(matches!(
            read_node(&mut file, 0),
            Err(Error::DecompressError)
        ));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let mut file = Cursor::new(Vec::new());
        let offset = write_node(&mut file, b"correct payload").unwrap();

        // Corrupt the stored uncompressed size
        file.seek(SeekFrom::Start(offset as u64)).unwrap();
        write_u32_le(&mut file, 3).unwrap();

        assert!(matches!(
            read_node(&mut file, offset),
            Err(Error::DecompressError)
        ));
    }

    #[test]
    fn test_empty_payload() {
        let mut file = Cursor::new(Vec::new());
        let offset = write_node(&mut file, b"").unwrap();
        assert_eq!(read_node(&mut file, offset).unwrap(), b"");
    }
}
