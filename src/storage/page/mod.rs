mod error;
mod header;
mod layout;
mod slotted;

pub use error::PageError;
pub use header::PageHeader;
pub use layout::{Slot, HEADER_SIZE, SLOT_SIZE};
pub use slotted::{Page, PagePtr, PageStats};
