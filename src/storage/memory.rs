//! In-memory storage implementation for testing and scratch merges.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageOutput};

type FileMap = Arc<Mutex<BTreeMap<String, Arc<[u8]>>>>;

/// An in-memory storage implementation.
///
/// Files become visible when their output is closed. An output dropped
/// without closing is discarded, so a half-written output never shows up
/// under its name.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: FileMap,
}

impl MemoryStorage {
    /// Create a new, empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.lock().values().map(|data| data.len() as u64).sum()
    }

    /// Overwrite a file's raw bytes.
    pub fn put_file(&self, name: &str, data: Vec<u8>) {
        self.files.lock().insert(name.to_string(), Arc::from(data));
    }

    /// Copy out a file's raw bytes.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        Ok(data.to_vec())
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(MemoryInput::new(Arc::clone(data))))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput::new(
            name.to_string(),
            Arc::clone(&self.files),
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn delete_dir(&self, name: &str) -> Result<()> {
        let prefix = format!("{}/", name.trim_end_matches('/'));
        self.files.lock().retain(|file, _| !file.starts_with(&prefix));
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(data.len() as u64)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;

        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
    size: u64,
}

impl MemoryInput {
    fn new(data: Arc<[u8]>) -> Self {
        let size = data.len() as u64;
        MemoryInput {
            cursor: Cursor::new(data),
            size,
        }
    }
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A memory-based output implementation.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
    closed: bool,
}

impl MemoryOutput {
    fn new(name: String, files: FileMap) -> Self {
        MemoryOutput {
            name,
            buffer: Vec::new(),
            files,
            closed: false,
        }
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data = Arc::from(std::mem::take(&mut self.buffer));
            self.files.lock().insert(self.name.clone(), data);
            self.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new();

        let mut output = storage.create_output("segment_0/index/body.post").unwrap();
        output.write_all(b"postings").unwrap();
        assert_eq!(output.position(), 8);
        assert!(!storage.file_exists("segment_0/index/body.post"));
        output.close().unwrap();

        assert!(storage.file_exists("segment_0/index/body.post"));
        assert_eq!(storage.file_size("segment_0/index/body.post").unwrap(), 8);

        let mut input = storage.open_input("segment_0/index/body.post").unwrap();
        let mut content = Vec::new();
        input.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"postings");
    }

    #[test]
    fn test_rename_and_delete() {
        let storage = MemoryStorage::new();
        storage.put_file("staging/a", vec![1, 2, 3]);

        storage.rename_file("staging/a", "segment_1/a").unwrap();
        assert!(!storage.file_exists("staging/a"));
        assert_eq!(storage.read_file("segment_1/a").unwrap(), vec![1, 2, 3]);

        storage.delete_file("segment_1/a").unwrap();
        storage.delete_file("segment_1/a").unwrap();
        assert_eq!(storage.file_count(), 0);
        assert!(storage.rename_file("missing", "other").is_err());
    }

    #[test]
    fn test_unclosed_output_is_discarded() {
        let storage = MemoryStorage::new();
        {
            let mut output = storage.create_output("partial").unwrap();
            output.write_all(b"half").unwrap();
        }
        assert!(!storage.file_exists("partial"));
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_delete_dir() {
        let storage = MemoryStorage::new();
        storage.put_file("merge_1/segment_0/meta.json", vec![1]);
        storage.put_file("merge_1/segment_0/index/body.post", vec![2]);
        storage.put_file("merge_10/keep", vec![3]);

        storage.delete_dir("merge_1").unwrap();
        storage.delete_dir("missing").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["merge_10/keep"]);
    }

    #[test]
    fn test_list_files_sorted() {
        let storage = MemoryStorage::new();
        storage.put_file("b", vec![]);
        storage.put_file("a", vec![0]);

        assert_eq!(storage.list_files().unwrap(), vec!["a", "b"]);
        assert_eq!(storage.total_size(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let storage = MemoryStorage::new();
        assert!(storage.open_input("nope").is_err());
    }
}
