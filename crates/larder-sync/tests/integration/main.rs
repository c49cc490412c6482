//! Integration tests for larder-sync
//!
//! Uses an in-memory remote store fake and a settable session provider to
//! verify end-to-end coordinator behavior: session lifecycle, optimistic
//! mutations with rollback, the trash lifecycle, and change-stream
//! reconciliation.


mod test_mutations;
mod test_trash;
