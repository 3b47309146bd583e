/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
///
/// Drawn from the u16 range, which caps a database file at 65,535 pages;
/// the all-ones value is reserved as the invalid sentinel.
pub type PageId = u16;

/// Sentinel for "no page": never allocated, never written to disk.
pub const INVALID_PAGE_ID: PageId = u16::MAX;

/// Buffer pool frame index type, range `[0, pool_size)`
pub type FrameId = usize;
