use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use anyhow::Result;

use crate::common::types::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;
use crate::storage::disk::DiskManager;
use crate::storage::page::{Page, PagePtr};

/// One buffer pool slot: a page plus the bookkeeping the pool keeps for it.
///
/// A free frame has `page_id == INVALID_PAGE_ID`, a zero pin count, and a
/// clean dirty flag.
pub struct Frame {
    pub page: PagePtr,
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
}

/// Shared handle to a frame
pub type FramePtr = Arc<RwLock<Frame>>;

impl Frame {
    fn new() -> Self {
        Self {
            page: Arc::new(RwLock::new(Page::new())),
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

/// Fixed-capacity cache of pages over a single database file.
///
/// Pages are fetched into frames on demand, pinned while in use, and
/// evicted least-recently-used-first once unpinned, with dirty frames
/// written back at eviction, on [`flush_page`](BufferPoolManager::flush_page),
/// and when the pool is dropped.
///
/// Each operation is internally synchronized, but the pool assumes
/// externally serialized access for multi-step sequences: a page handle
/// returned by `fetch_page`/`new_page` stays valid until the matching
/// `unpin_page`, and the underlying bytes are never recycled for another
/// page while any pin is outstanding. Every successful fetch or new must
/// be paired with exactly one unpin.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<FramePtr>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    free_frames: RwLock<VecDeque<FrameId>>,
    replacer: RwLock<LruReplacer>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` frames over the database file at
    /// `db_path`, creating the file if absent.
    pub fn new(pool_size: usize, db_path: impl AsRef<Path>) -> Result<Self, BufferPoolError> {
        if pool_size == 0 {
            return Err(BufferPoolError::InvalidOperation(
                "buffer pool needs at least one frame".to_string(),
            ));
        }

        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_frames = VecDeque::with_capacity(pool_size);

        for frame_id in 0..pool_size {
            frames.push(Arc::new(RwLock::new(Frame::new())));
            free_frames.push_back(frame_id);
        }

        Ok(Self {
            pool_size,
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_frames: RwLock::new(free_frames),
            replacer: RwLock::new(LruReplacer::new(pool_size)),
            disk_manager,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Whether `page_id` currently occupies a frame. Does not touch pin
    /// counts or recency order.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Pin the page into a frame and return its handle, reading it from
    /// disk on a miss. A page the file does not hold yet comes back empty.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "cannot fetch the invalid page ID".to_string(),
            ));
        }

        if let Some(&frame_id) = self.page_table.read().get(&page_id) {
            let frame = &self.frames[frame_id];
            frame.write().pin_count += 1;
            self.replacer.write().record_access(frame_id);
            return Ok(frame.read().page.clone());
        }

        let frame_id = self.allocate_frame()?;
        let frame = &self.frames[frame_id];

        let read_result = {
            let mut frame_guard = frame.write();
            let result = {
                let mut page_guard = frame_guard.page.write();
                self.disk_manager.read_page(page_id, &mut page_guard)
            };
            if result.is_ok() {
                frame_guard.page_id = page_id;
                frame_guard.pin_count = 1;
                frame_guard.is_dirty = false;
            }
            result
        };

        if let Err(e) = read_result {
            self.free_frames.write().push_back(frame_id);
            return Err(e.into());
        }

        self.page_table.write().insert(page_id, frame_id);
        self.replacer.write().record_access(frame_id);

        Ok(frame.read().page.clone())
    }

    /// Allocate a fresh page id and pin an empty page for it. The new page
    /// starts dirty; it reaches disk at write-back. The frame is acquired
    /// first, so a full pool never burns a page id.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let frame_id = self.allocate_frame()?;
        let page_id = match self.disk_manager.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_frames.write().push_back(frame_id);
                return Err(e.into());
            }
        };
        let frame = &self.frames[frame_id];

        {
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                page_guard.reset();
                page_guard.set_page_id(page_id);
            }
            frame_guard.page_id = page_id;
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = true;
        }

        self.page_table.write().insert(page_id, frame_id);
        self.replacer.write().record_access(frame_id);

        Ok((frame.read().page.clone(), page_id))
    }

    /// Release one pin on a resident page. The dirty flag is sticky: once
    /// a caller unpins dirty, later clean unpins do not clear it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let frame_id = self.resident_frame(page_id)?;
        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();

        if frame_guard.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        frame_guard.pin_count -= 1;
        if is_dirty {
            frame_guard.is_dirty = true;
        }

        Ok(())
    }

    /// Write a resident page back to disk if dirty. Clean pages succeed
    /// without I/O; pin counts and recency order are untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame_id = self.resident_frame(page_id)?;
        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();

        if frame_guard.is_dirty {
            {
                let page_guard = frame_guard.page.read();
                self.disk_manager.write_page(&page_guard)?;
            }
            frame_guard.is_dirty = false;
        }

        Ok(())
    }

    /// Drop an unpinned resident page from the pool, writing it back first
    /// if dirty. Fails for pages that are pinned or not resident; bytes
    /// already on disk stay where they are.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame_id = self.resident_frame(page_id)?;
        let frame = &self.frames[frame_id];

        {
            let mut frame_guard = frame.write();
            if frame_guard.pin_count > 0 {
                return Err(BufferPoolError::PagePinned(page_id));
            }

            if frame_guard.is_dirty {
                {
                    let page_guard = frame_guard.page.read();
                    self.disk_manager.write_page(&page_guard)?;
                }
                frame_guard.is_dirty = false;
            }

            frame_guard.page.write().reset();
            frame_guard.page_id = INVALID_PAGE_ID;
        }

        self.page_table.write().remove(&page_id);
        self.replacer.write().remove(frame_id);
        self.free_frames.write().push_back(frame_id);

        Ok(())
    }

    /// Write every dirty resident page to disk and mark it clean. Pin
    /// counts and recency order are unaffected. Write failures are logged
    /// and the sweep moves on to the next frame.
    pub fn flush_all_dirty_pages(&self) -> Result<(), BufferPoolError> {
        for frame in &self.frames {
            let mut frame_guard = frame.write();
            if frame_guard.page_id != INVALID_PAGE_ID && frame_guard.is_dirty {
                let result = {
                    let page_guard = frame_guard.page.read();
                    self.disk_manager.write_page(&page_guard)
                };
                if let Err(e) = result {
                    log::error!(
                        "failed to flush page {} during flush-all: {}",
                        frame_guard.page_id,
                        e
                    );
                }
                frame_guard.is_dirty = false;
            }
        }

        Ok(())
    }

    fn resident_frame(&self, page_id: PageId) -> Result<FrameId, BufferPoolError> {
        self.page_table
            .read()
            .get(&page_id)
            .copied()
            .ok_or(BufferPoolError::PageNotFound(page_id))
    }

    /// Take a frame from the free list, evicting first when it is empty.
    fn allocate_frame(&self) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = self.free_frames.write().pop_front() {
            return Ok(frame_id);
        }

        self.evict_frame()?;

        self.free_frames
            .write()
            .pop_front()
            .ok_or(BufferPoolError::BufferPoolFull)
    }

    /// Evict the least recently used unpinned frame back to the free list,
    /// writing it out first when dirty. Write-back failures are logged and
    /// the eviction proceeds.
    fn evict_frame(&self) -> Result<(), BufferPoolError> {
        let victim = {
            let replacer = self.replacer.read();
            let found = replacer
                .iter()
                .find(|&frame_id| self.frames[frame_id].read().pin_count == 0);
            found
        };

        let frame_id = match victim {
            Some(frame_id) => frame_id,
            None => return Err(BufferPoolError::BufferPoolFull),
        };

        let page_id = {
            let mut frame_guard = self.frames[frame_id].write();
            let page_id = frame_guard.page_id;

            if frame_guard.is_dirty {
                let result = {
                    let page_guard = frame_guard.page.read();
                    self.disk_manager.write_page(&page_guard)
                };
                if let Err(e) = result {
                    log::error!("failed to write page {} back during eviction: {}", page_id, e);
                }
                frame_guard.is_dirty = false;
            }

            frame_guard.page_id = INVALID_PAGE_ID;
            page_id
        };

        log::debug!("evicted page {} from frame {}", page_id, frame_id);

        self.page_table.write().remove(&page_id);
        self.replacer.write().remove(frame_id);
        self.free_frames.write().push_back(frame_id);

        Ok(())
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        // write-back failures are logged inside the sweep
        let _ = self.flush_all_dirty_pages();
    }
}
