use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::error::CleaveError;
use crate::types::Result;

/// Read-only memory-mapped view of an input file.
///
/// Zero-length files are not mapped at all; `as_slice` returns an empty
/// slice for them so callers see the same contract either way.
pub struct MappedInput {
    mmap: Option<Mmap>,
    path: PathBuf,
    len: usize,
}

impl MappedInput {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only and outlives no borrow of
            // this struct; mutation of the underlying file by another
            // process is outside this contract.
            Some(unsafe { MmapOptions::new().map(&file)? })
        };

        tracing::debug!(path = %path.display(), len, "input mapped");
        Ok(Self { mmap, path, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn slice(&self, start: usize, end: usize) -> Result<&[u8]> {
        if start > end || end > self.len {
            return Err(CleaveError::Boundary("mapped range out of bounds"));
        }
        Ok(&self.as_slice()[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_file_contents() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"mapped bytes")?;
        let mapped = MappedInput::open(file.path())?;
        assert_eq!(mapped.as_slice(), b"mapped bytes");
        assert_eq!(mapped.slice(7, 12)?, b"bytes");
        assert!(mapped.slice(7, 13).is_err());
        Ok(())
    }

    #[test]
    fn empty_file_is_empty_slice() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let file = tempfile::NamedTempFile::new()?;
        let mapped = MappedInput::open(file.path())?;
        assert!(mapped.is_empty());
        assert_eq!(mapped.as_slice(), b"");
        Ok(())
    }
}
