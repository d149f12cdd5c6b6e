pub mod memory_drafts;

pub use memory_drafts::MemoryDraftStore;
