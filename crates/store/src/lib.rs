// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aro-store: the Run Store (§4.1) — durable, file-backed persistence for
//! `RunRecord`s and their append-only command/log streams.

mod error;
mod fs_store;
mod io;
mod patch;

pub use error::StoreError;
pub use fs_store::{FsRunStore, RunStore};
pub use io::{atomic_write, FsRunStoreIo, RunStoreIo};
pub use patch::RunPatch;
