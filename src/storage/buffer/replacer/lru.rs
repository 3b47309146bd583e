use linked_hash_map::LinkedHashMap;
use crate::common::types::FrameId;

/// LRU recency order over installed frames.
///
/// Order only: every installed frame is tracked, pinned ones included.
/// Pin-aware victim selection belongs to the buffer pool manager, which
/// scans [`iter`](LruReplacer::iter) oldest-first.
pub struct LruReplacer {
    lru_list: LinkedHashMap<FrameId, ()>,
}

impl LruReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            lru_list: LinkedHashMap::with_capacity(pool_size),
        }
    }

    /// Record that a frame has been accessed, moving it to the
    /// most-recently-used end.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.lru_list.get_refresh(&frame_id).is_none() {
            self.lru_list.insert(frame_id, ());
        }
    }

    /// Drop a frame from the recency order entirely.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.lru_list.remove(&frame_id);
    }

    /// Frames in least-recently-used-first order.
    pub fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.lru_list.keys().copied()
    }
}
