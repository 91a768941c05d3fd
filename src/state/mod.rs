//! Grid state that outlives a single render: persisted settings and the
//! messages that mutate them.

pub mod events;
pub mod persistence;

pub use events::GridEvent;
pub use persistence::{
    FileSessionStore, GridStatePersistence, MemorySessionStore, PersistedSettings, SessionStore,
};
