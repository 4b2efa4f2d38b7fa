//! Integration tests for coursesync-sync
//!
//! Drives the builder, updater and syncer against in-memory fakes of the
//! catalog, credential provider and snapshot store, with a temporary
//! directory as the local mirror.

mod common;

mod test_sync;
