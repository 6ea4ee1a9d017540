//! Data portability: full-fidelity export and transactional import.
//!
//! A package is a ZIP archive holding `data.json` (the whole data record),
//! `manifest.json` and the referenced media under `media/images/` and
//! `media/audio/`. Bare JSON packages from older versions are still read.
//!
//! - **Export**: snapshot the store → records → bundle media → encode archive
//! - **Import**: preflight → decode → validate → place media → one transaction
//!   (replace, upsert flashcards, reconcile, verify) → preferences → notify
//! - **Reconcile**: repair schedules and the active period, standalone or as
//!   the last step of an import
//!
//! # Example
//!
//! ```ignore
//! use sv::portability::Porter;
//!
//! let porter = Porter::new(storage, prefs, media_dir, options);
//! let (bytes, stats) = porter.export_bytes().await?;
//! let outcome = porter.import_bytes(bytes).await?;
//! ```

pub mod codec;
pub mod engine;
pub mod export;
pub mod file;
pub mod hash;
pub mod import;
pub mod media;
pub mod notify;
pub mod preflight;
pub mod reconcile;
pub mod serialize;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod validate;

pub use codec::{DecodedPackage, decode, encode};
pub use engine::Porter;
pub use export::{Exporter, Snapshot};
pub use import::{ImportOutcome, Importer};
pub use media::{MediaBundle, MediaFile};
pub use notify::{EventSink, Notification, RecordingSink, TracingSink};
pub use preflight::{FixedSpace, FsSpaceProbe, SpaceProbe};
pub use reconcile::ReconcileOutcome;
pub use serialize::{Portable, serialize};
pub use types::{
    EntityStats, ErrorKind, ExportStats, ImportStats, Manifest, Metadata, Operation,
    PackageRecord, PortResult, PortabilityError,
};
pub use validate::{ValidationReport, validate};
