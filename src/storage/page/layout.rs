use byteorder::{ByteOrder, LittleEndian};

/// Serialized page header size: num_slots, free_space_start, free_space_end
pub const HEADER_SIZE: usize = 6; // 2 bytes per field * 3 fields

/// Serialized slot entry size: offset, length, flags
pub const SLOT_SIZE: usize = 6;

const FLAG_DELETED: u16 = 1 << 0;

/// One slot directory entry. The flags word carries the tombstone bit;
/// a tombstoned slot keeps its old offset/length so compaction can
/// account for the abandoned byte range.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub offset: u16,
    pub length: u16,
    pub is_deleted: bool,
}

impl Slot {
    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], self.offset);
        LittleEndian::write_u16(&mut bytes[2..4], self.length);
        let flags = if self.is_deleted { FLAG_DELETED } else { 0 };
        LittleEndian::write_u16(&mut bytes[4..6], flags);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let offset = LittleEndian::read_u16(&bytes[0..2]);
        let length = LittleEndian::read_u16(&bytes[2..4]);
        let flags = LittleEndian::read_u16(&bytes[4..6]);
        Self {
            offset,
            length,
            is_deleted: flags & FLAG_DELETED != 0,
        }
    }
}
