//! Domain logic for the ACE registration backend.
//!
//! Everything here is pure: validation rules, phone normalisation, ACE ID
//! arithmetic, certificate placeholder rendering and the names of the
//! workflow stages. I/O lives in `ace-db`, `ace-delivery` and `ace-api`.

pub mod ace_id;
pub mod certificate;
pub mod error;
pub mod registration;
pub mod stage;
pub mod types;
