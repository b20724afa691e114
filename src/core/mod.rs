//! Core discovery logic - registries and pure computation with no direct I/O.
//!
//! Contains the request/response correlation (`pending_requests`), collision
//! challenges (`challenges`), peer sampling (`sampling`) and the ban predicates
//! (`reputation`). All I/O orchestration lives in `explorer/`, which calls into this module.

pub mod challenges;
pub mod pending_requests;
pub mod reputation;
pub(crate) mod sampling;
