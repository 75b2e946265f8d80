//! Catalog-driven import of staged uploads.
//!
//! [`import_originals`] asks the catalog for every photo that is neither
//! imported nor invalidated and submits one [`ImportJob`] per photo to the
//! worker pool. It does not wait for the jobs: completion shows up as
//! `is_imported` on a later query.

pub mod error;
mod job;
mod producer;

pub use self::job::{ImportJob, Stage};
pub use self::producer::{ImportSummary, import_originals};
