pub mod booking_engine;
pub mod inventory;
pub mod scan_verifier;

pub use booking_engine::BookingEngine;
pub use inventory::Inventory;
pub use scan_verifier::{ScanOutcome, ScanVerifier};
