pub mod contact;
pub mod frame;

pub use contact::{Contact, TouchReport, MAX_CONTACTS};
pub use frame::{AdcFrame, CaptureFrame, ImageStats};
