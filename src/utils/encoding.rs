use std::io::{self, Read, Write};

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a u32 from a byte slice at `offset`
/// Returns None if the slice is too short
pub fn get_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write a u32 into a byte slice at `offset`
/// Panics if the slice is too short; callers size their buffers up front
pub fn put_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_roundtrip() {
        let values = [0, 1, 0x80, 0xffff_ffff, 0xdead_beef];
        for value in values {
            let mut buf = Vec::new();
            write_u32_le(&mut buf, value).unwrap();
            let decoded = read_u32_le(&mut buf.as_slice()).unwrap();
            assert_eq!(value, decoded);
            assert_eq!(get_u32_le(&buf, 0), Some(value));
        }
    }

    #[test]
    fn test_get_u32_le_short_buffer() {
        assert_eq!(get_u32_le(&[1, 2, 3], 0), None);
        assert_eq!(get_u32_le(&[1, 2, 3, 4], 1), None);
    }

    #[test]
    fn test_put_u32_le() {
        let mut buf = vec![0u8; 8];
        put_u32_le(&mut buf, 4, 0x0403_0201);
        assert_eq!(&buf[4..], &[1, 2, 3, 4]);
    }
}
