use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::Page;

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
    #[error("Page ID space exhausted")]
    PageIdSpaceExhausted,
}

/// DiskManager is responsible for the page-granular I/O on the single
/// database file and for handing out fresh page ids.
///
/// Page `i` occupies bytes `[i * PAGE_SIZE, (i + 1) * PAGE_SIZE)`; the file
/// has no header or trailer and may be sparse, with unwritten pages reading
/// back as all zeros.
pub struct DiskManager {
    db_file: Mutex<File>,
    next_page_id: Mutex<PageId>,
}

impl DiskManager {
    /// Open the database file, creating it if absent. Id allocation resumes
    /// after the pages the file already holds.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        let file_len = file.metadata()?.len();
        let next_page_id = (file_len / PAGE_SIZE as u64).min(INVALID_PAGE_ID as u64) as PageId;

        Ok(Self {
            db_file: Mutex::new(file),
            next_page_id: Mutex::new(next_page_id),
        })
    }

    /// Read a page from disk. A page at or past EOF (never written, or cut
    /// short) comes back as an empty page; the page id is set either way.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        let file_len = file.metadata()?.len();

        if offset + PAGE_SIZE as u64 > file_len {
            page.reset();
            page.set_page_id(page_id);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page.data_mut())?;
        page.set_page_id(page_id);

        Ok(())
    }

    /// Write a page to disk and flush the file buffer.
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        let page_id = page.page_id();
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.flush()?;

        Ok(())
    }

    /// Allocate the next page id. The file is not extended here; an
    /// unwritten page reads back as an empty page until its first
    /// write-back.
    pub fn allocate_page(&self) -> Result<PageId, DiskManagerError> {
        let mut next = self.next_page_id.lock();
        if *next == INVALID_PAGE_ID {
            return Err(DiskManagerError::PageIdSpaceExhausted);
        }

        let page_id = *next;
        *next += 1;
        Ok(page_id)
    }
}
