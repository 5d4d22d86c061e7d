pub mod booking_repo;
pub mod event_repo;
pub mod ledger;
pub mod scan_repo;

pub use booking_repo::BookingRepo;
pub use event_repo::EventRepo;
pub use ledger::AvailabilityLedger;
pub use scan_repo::ScanRepo;
