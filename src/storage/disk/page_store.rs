use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{HeapDbError, Result};

/// PageStore reads and writes whole fixed-size pages of one table file.
///
/// The file is a flat sequence of pages and only ever grows by
/// [`PageStore::append_page`], so its length stays a multiple of the page
/// size. The store does no page-level locking: callers must already hold the
/// matching lock from the lock manager. The internal mutex only keeps each
/// seek + read/write pair atomic.
pub struct PageStore {
    /// The table file
    file: Mutex<File>,
    /// Path to the table file
    path: PathBuf,
    /// Bytes per page
    page_size: usize,
    /// Number of page reads performed
    num_reads: AtomicU64,
    /// Number of page writes performed (appends included)
    num_writes: AtomicU64,
}

impl PageStore {
    /// Opens the page file at `path`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(HeapDbError::InvalidConfig(
                "page size must be non-zero".to_string(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
            page_size,
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    /// Reads page `page_no` in full.
    /// Fails if the page does not lie entirely within the file.
    pub fn read_page(&self, page_no: u32) -> Result<Vec<u8>> {
        let offset = self.offset_of(page_no);

        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        if offset + self.page_size as u64 > len {
            return Err(HeapDbError::PageOutOfBounds {
                page_no,
                num_pages: self.pages_for_len(len),
            });
        }

        let mut data = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;
        drop(file);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!(path = %self.path.display(), page_no, "read page");
        Ok(data)
    }

    /// Writes page `page_no`.
    /// The page may start at most at the current end of the file.
    pub fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(HeapDbError::PageSizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        let offset = self.offset_of(page_no);

        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        if offset > len {
            return Err(HeapDbError::PageOutOfBounds {
                page_no,
                num_pages: self.pages_for_len(len),
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        drop(file);

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(path = %self.path.display(), page_no, "wrote page");
        Ok(())
    }

    /// Appends an all-zero page at the end of the file and returns its number.
    pub fn append_page(&self) -> Result<u32> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let page_no = self.pages_for_len(len);

        let zeros = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.offset_of(page_no)))?;
        file.write_all(&zeros)?;
        file.flush()?;
        drop(file);

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(path = %self.path.display(), page_no, "appended page");
        Ok(page_no)
    }

    /// Returns the number of pages: `ceil(file_len / page_size)`.
    pub fn page_count(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok(self.pages_for_len(len))
    }

    /// Returns the page size this store was opened with.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }

    fn offset_of(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    fn pages_for_len(&self, len: u64) -> u32 {
        len.div_ceil(self.page_size as u64) as u32
    }
}
