//! Transparent gzip decompression for input files.
//!
//! Flat files in this domain routinely arrive gzipped. Readers call
//! [`open_source`] instead of `File::open` and get a stream that decompresses
//! when the path extension or magic bytes say so, and passes through
//! otherwise.
//!
//! Detection strategy:
//! 1. file extension (`.gz`, `.gzip`) — fast path;
//! 2. magic bytes (`1f 8b`) peeked from the stream;
//! 3. no match: plain buffered reader.
//!
//! Compressed streams do not support seeking, so callers must treat every
//! source as forward-only (which the reader contract already requires).

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::ImportError;

/// Open a source file with transparent decompression.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn Read>, ImportError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| ImportError::unreadable(path.display().to_string(), e))?;
    auto_detect_reader(file, path)
}

/// Wrap a reader with gzip decompression if the path hint or magic bytes
/// indicate gzip content.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>, ImportError> {
    if is_gzip_path(&path_hint) {
        return Ok(wrap_gzip(Box::new(reader)));
    }

    let mut buffered = BufReader::new(reader);
    if peek_gzip_magic(&mut buffered)? {
        return Ok(wrap_gzip(Box::new(buffered)));
    }
    Ok(Box::new(buffered))
}

fn is_gzip_path(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref().to_string_lossy().to_lowercase();
    path.ends_with(".gz") || path.ends_with(".gzip")
}

fn peek_gzip_magic<R: BufRead>(reader: &mut R) -> Result<bool, ImportError> {
    let buf = reader.fill_buf()?;
    Ok(buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b)
}

#[cfg(feature = "compression-gzip")]
fn wrap_gzip(reader: Box<dyn Read>) -> Box<dyn Read> {
    Box::new(flate2::read::GzDecoder::new(reader))
}

// Without the codec the stream passes through; a genuinely gzipped file will
// then fail at parse time with a malformed-record error.
#[cfg(not(feature = "compression-gzip"))]
fn wrap_gzip(reader: Box<dyn Read>) -> Box<dyn Read> {
    reader
}

#[cfg(test)]
#[cfg(feature = "compression-gzip")]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip_bytes(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn detects_by_extension() {
        let compressed = gzip_bytes("symbol\tchromosome\nTP53\t17\n");
        let mut reader =
            auto_detect_reader(std::io::Cursor::new(compressed), "genes.tsv.gz").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert!(out.starts_with("symbol\t"));
    }

    #[test]
    fn detects_by_magic_bytes_without_extension() {
        let compressed = gzip_bytes("TP53\t17\n");
        let mut reader =
            auto_detect_reader(std::io::Cursor::new(compressed), "genes.tsv").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "TP53\t17\n");
    }

    #[test]
    fn passes_plain_text_through() {
        let mut reader =
            auto_detect_reader(std::io::Cursor::new(b"TP53\t17\n".to_vec()), "genes.tsv").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "TP53\t17\n");
    }

    #[test]
    fn missing_file_is_unreadable_source() {
        let err = open_source("/definitely/not/here.tsv").err().unwrap();
        assert!(err.to_string().contains("unreadable source"));
    }
}
