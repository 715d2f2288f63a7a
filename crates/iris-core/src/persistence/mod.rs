//! Local persistence.
//!
//! # Overview
//!
//! Two namespaced keys live in a [`KeyValueStore`]:
//!
//! - **`iris.identity`** - the signed-in (or guest) identity blob
//! - **`iris.guest_session`** - the single active guest session snapshot
//!
//! Both are plain JSON overwritten on every write. Authenticated users keep
//! their history on the server instead.

pub mod snapshot;
pub mod store;

pub use snapshot::{
    clear_guest_snapshot, load_guest_snapshot, save_guest_snapshot, GuestSnapshot,
    GUEST_SESSION_KEY, IDENTITY_KEY,
};
pub use store::{get_json, set_json, FileStore, KeyValueStore, MemoryStore, StoreError};
