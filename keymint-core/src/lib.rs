//! License issuance, activation, validation, and revocation.
//!
//! Keymint issues opaque license keys, walks them through the
//! `pending -> active -> expired / revoked` lifecycle, and records every
//! activation, deactivation, revocation, and validation attempt in an
//! append-only audit trail.
//!
//! # Architecture
//!
//! - [`KeyCodec`] derives key strings from a signing secret and checks
//!   surface format
//! - [`License`] owns the state machine; every mutating method ends with an
//!   explicit normalization step that materializes lazy expiry (there is no
//!   background sweep)
//! - [`LicenseCheck`] entries form the audit trail
//! - [`LicenseService`] enforces the business guards and shapes
//!   caller-facing results; rejections a caller branches on are values,
//!   not errors
//! - [`LicenseStore`] abstracts persistence; [`MemoryStore`] ships here and
//!   a SQLite-backed store ships in `keymint-store`
//!
//! # Example
//!
//! ```
//! use keymint_core::{CreateLicense, KeyCodec, LicenseService, LicenseStore,
//!                    LicenseType, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let plan = LicenseType::new("Pro", 30);
//! store.insert_license_type(&plan)?;
//!
//! let service = LicenseService::new(store, KeyCodec::new("signing-secret"));
//! let license = service.create(CreateLicense::new(plan.id))?;
//!
//! let outcome = service.activate(&license.key, Some("fp-1"))?;
//! assert!(outcome.success);
//! let validation = service.validate(&license.key, Some("fp-1"))?;
//! assert!(validation.valid);
//! # Ok::<(), keymint_core::Error>(())
//! ```

mod audit;
mod error;
mod hardware;
mod ids;
mod key;
mod license;
mod memory;
mod service;
mod store;

pub use audit::{CheckStatus, LicenseCheck, ParseCheckStatusError};
pub use error::{Error, Result};
pub use hardware::HardwareFingerprint;
pub use ids::{CheckId, LicenseId, LicenseTypeId};
pub use key::{KeyCodec, MAX_PREFIX_LEN};
pub use license::{CheckFailure, License, LicenseStatus, LicenseType, ParseStatusError};
pub use memory::MemoryStore;
pub use service::{CreateLicense, LicenseData, LicenseInfo, LicenseService, Outcome, Validation};
pub use store::{LicenseOrder, LicenseStore, SearchFilter, StoreError, StoreResult};
