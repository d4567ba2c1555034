pub mod memory;
pub mod source;
pub mod storage;
pub mod whatsapp;

pub use memory::InMemoryRepository;
pub use source::{FileResourceSource, HttpResourceSource};
pub use storage::LocalStorage;
pub use whatsapp::WhatsAppClient;
