//! Data model for objstream multi-part transfers.
//!
//! This crate holds the wire-neutral types exchanged between the transfer
//! engines in `objstream-core` and a concrete remote store backend: object
//! locators, per-segment receipts, the finalize manifest, and the events
//! observed on a remote read channel. It contains no I/O and no protocol
//! logic.

mod read;
mod transfer;

pub use read::{ObjectMeta, ReadEvent, ResponseHeaders};
pub use transfer::{FinalizeManifest, FinalizeReceipt, Locator, SegmentReceipt};
