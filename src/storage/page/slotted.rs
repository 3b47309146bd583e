use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::error::PageError;
use crate::storage::page::header::PageHeader;
use crate::storage::page::layout::{Slot, HEADER_SIZE, SLOT_SIZE};

/// A 4KB slotted page: header, then a slot directory growing forward,
/// then free space, then the record heap growing backward from the end
/// of the buffer.
///
/// The `page_id` is not part of the serialized bytes; it is assigned by
/// the buffer pool when the page is installed in a frame, and on disk a
/// page is identified purely by its position in the file.
pub struct Page {
    data: [u8; PAGE_SIZE],
    page_id: PageId,
}

/// Shared handle to a pooled page
pub type PagePtr = Arc<RwLock<Page>>;

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        let mut page = Self {
            data: [0; PAGE_SIZE],
            page_id: INVALID_PAGE_ID,
        };
        page.write_header(&PageHeader::new());
        page
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    /// Raw page bytes, exactly what goes to and comes from disk.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Re-initialize to the empty-page state and drop the page id.
    pub fn reset(&mut self) {
        self.data = [0; PAGE_SIZE];
        self.write_header(&PageHeader::new());
        self.page_id = INVALID_PAGE_ID;
    }

    /// Place the record at the tail end of free space and append a slot
    /// for it, returning the new slot number. Fails without touching the
    /// page when the grown slot directory would run into the record heap.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<u16, PageError> {
        let mut header = self.header();

        let length =
            u16::try_from(record.len()).map_err(|_| PageError::InsufficientSpace)?;
        let new_record_start = header
            .free_space_end
            .checked_sub(length)
            .ok_or(PageError::InsufficientSpace)?;
        let slot_array_end = HEADER_SIZE + (header.num_slots as usize + 1) * SLOT_SIZE;

        if slot_array_end >= new_record_start as usize {
            return Err(PageError::InsufficientSpace);
        }

        // record heap grows backward
        self.data[new_record_start as usize..header.free_space_end as usize]
            .copy_from_slice(record);

        // slot directory grows forward
        let slot_num = header.num_slots;
        self.write_slot(
            slot_num,
            &Slot {
                offset: new_record_start,
                length,
                is_deleted: false,
            },
        );

        header.num_slots += 1;
        header.free_space_start = slot_array_end as u16;
        header.free_space_end = new_record_start;
        self.write_header(&header);

        Ok(slot_num)
    }

    /// Borrowed view of the record bytes in slot `slot_num`.
    pub fn get_record(&self, slot_num: u16) -> Result<&[u8], PageError> {
        let header = self.header();
        if slot_num >= header.num_slots {
            return Err(PageError::InvalidSlotId);
        }

        let slot = self.slot(slot_num);
        if slot.is_deleted {
            return Err(PageError::RecordNotFound);
        }

        let start = slot.offset as usize;
        Ok(&self.data[start..start + slot.length as usize])
    }

    /// Tombstone the slot. The record bytes stay in place and are only
    /// reclaimed by compaction; slot numbers of other records never shift.
    pub fn delete_record(&mut self, slot_num: u16) -> Result<(), PageError> {
        let header = self.header();
        if slot_num >= header.num_slots {
            return Err(PageError::InvalidSlotId);
        }

        let mut slot = self.slot(slot_num);
        if slot.is_deleted {
            return Err(PageError::RecordNotFound);
        }

        // offset/length stay behind so compaction can account for the range
        slot.is_deleted = true;
        self.write_slot(slot_num, &slot);
        Ok(())
    }

    /// Overwrite the record in slot `slot_num`. Equal or shrinking updates
    /// happen in place with the slot metadata untouched. A growing update
    /// relocates the record to the tail of free space, tombstoning the old
    /// extent in a fresh directory entry; the caller-visible slot number
    /// never changes.
    pub fn update_record(&mut self, slot_num: u16, record: &[u8]) -> Result<(), PageError> {
        let mut header = self.header();
        if slot_num >= header.num_slots {
            return Err(PageError::InvalidSlotId);
        }

        let mut slot = self.slot(slot_num);
        if slot.is_deleted {
            return Err(PageError::RecordNotFound);
        }

        let new_length =
            u16::try_from(record.len()).map_err(|_| PageError::InsufficientSpace)?;

        if new_length <= slot.length {
            let start = slot.offset as usize;
            self.data[start..start + record.len()].copy_from_slice(record);
            return Ok(());
        }

        // grow path: same feasibility test as insert, since exactly one
        // directory entry (the tombstone for the old extent) is appended
        let new_record_start = header
            .free_space_end
            .checked_sub(new_length)
            .ok_or(PageError::InsufficientSpace)?;
        let slot_array_end = HEADER_SIZE + (header.num_slots as usize + 1) * SLOT_SIZE;
        if slot_array_end >= new_record_start as usize {
            return Err(PageError::InsufficientSpace);
        }

        self.write_slot(
            header.num_slots,
            &Slot {
                offset: slot.offset,
                length: slot.length,
                is_deleted: true,
            },
        );
        header.num_slots += 1;
        header.free_space_start = slot_array_end as u16;

        self.data[new_record_start as usize..header.free_space_end as usize]
            .copy_from_slice(record);
        header.free_space_end = new_record_start;

        slot.offset = new_record_start;
        slot.length = new_length;
        self.write_slot(slot_num, &slot);
        self.write_header(&header);

        Ok(())
    }

    /// Number of live (non-tombstoned) records.
    pub fn record_count(&self) -> u16 {
        let header = self.header();
        (0..header.num_slots)
            .filter(|&i| !self.slot(i).is_deleted)
            .count() as u16
    }

    /// Rewrite the record heap to squeeze out tombstoned ranges.
    ///
    /// Walks the extents from the highest offset down, sliding each live
    /// record toward the end of the buffer by the total length of the
    /// tombstones seen so far, then rebuilds the directory from the
    /// survivors in walk order. Survivor slot numbers may change; callers
    /// must not hold on to slot numbers across a compaction.
    pub fn compact(&mut self) {
        let header = self.header();
        let mut slots: Vec<Slot> = (0..header.num_slots).map(|i| self.slot(i)).collect();

        // highest offset first, so a shifted record never lands on bytes
        // that still have to move
        slots.sort_by(|a, b| b.offset.cmp(&a.offset));

        let mut gap: u16 = 0;
        let mut last_offset = PAGE_SIZE as u16;
        let mut survivors: Vec<Slot> = Vec::with_capacity(slots.len());
        for mut slot in slots {
            if slot.is_deleted {
                gap += slot.length;
            } else {
                let new_offset = slot.offset + gap;
                let src = slot.offset as usize;
                self.data
                    .copy_within(src..src + slot.length as usize, new_offset as usize);
                slot.offset = new_offset;
                last_offset = new_offset;
                survivors.push(slot);
            }
        }

        let num_slots = survivors.len() as u16;
        for (i, slot) in survivors.iter().enumerate() {
            self.write_slot(i as u16, slot);
        }
        self.write_header(&PageHeader {
            num_slots,
            free_space_start: (HEADER_SIZE + num_slots as usize * SLOT_SIZE) as u16,
            free_space_end: last_offset,
        });
    }

    /// Insert, compacting first if the contiguous gap is too small but
    /// tombstoned ranges would make room.
    pub fn insert_record_smart(&mut self, record: &[u8]) -> Result<u16, PageError> {
        match self.insert_record(record) {
            Err(PageError::InsufficientSpace) => {}
            other => return other,
        }

        if record.len() + SLOT_SIZE > self.total_free_space() {
            return Err(PageError::InsufficientSpace);
        }

        self.compact();
        self.insert_record(record)
    }

    /// True when more than a quarter of the directory is tombstones.
    pub fn needs_compaction(&self) -> bool {
        let header = self.header();
        if header.num_slots == 0 {
            return false;
        }
        self.tombstone_count() > header.num_slots / 4
    }

    /// Bytes in the gap between the slot directory and the record heap.
    pub fn contiguous_free_space(&self) -> u16 {
        let header = self.header();
        header.free_space_end - header.free_space_start
    }

    /// Contiguous free bytes plus everything compaction could reclaim.
    pub fn total_free_space(&self) -> usize {
        let header = self.header();
        let reclaimable: usize = (0..header.num_slots)
            .map(|i| self.slot(i))
            .filter(|slot| slot.is_deleted)
            .map(|slot| slot.length as usize)
            .sum();
        self.contiguous_free_space() as usize + reclaimable
    }

    pub fn stats(&self) -> PageStats {
        let header = self.header();
        PageStats {
            num_slots: header.num_slots,
            live_records: self.record_count(),
            free_space_start: header.free_space_start,
            free_space_end: header.free_space_end,
        }
    }

    fn tombstone_count(&self) -> u16 {
        let header = self.header();
        (0..header.num_slots)
            .filter(|&i| self.slot(i).is_deleted)
            .count() as u16
    }

    fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data[0..HEADER_SIZE])
    }

    fn write_header(&mut self, header: &PageHeader) {
        self.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    fn slot_pos(slot_num: u16) -> usize {
        HEADER_SIZE + slot_num as usize * SLOT_SIZE
    }

    fn slot(&self, slot_num: u16) -> Slot {
        let pos = Self::slot_pos(slot_num);
        Slot::from_bytes(&self.data[pos..pos + SLOT_SIZE])
    }

    fn write_slot(&mut self, slot_num: u16, slot: &Slot) {
        let pos = Self::slot_pos(slot_num);
        self.data[pos..pos + SLOT_SIZE].copy_from_slice(&slot.to_bytes());
    }
}

/// Snapshot of the directory and free-space bounds, for logging and tests.
#[derive(Debug, Clone, Copy)]
pub struct PageStats {
    pub num_slots: u16,
    pub live_records: u16,
    pub free_space_start: u16,
    pub free_space_end: u16,
}

impl fmt::Display for PageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slots={} live={} free_space=[{}, {})",
            self.num_slots, self.live_records, self.free_space_start, self.free_space_end
        )
    }
}
