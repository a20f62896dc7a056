// SPDX-License-Identifier: MIT

//! Model plumbing shared by the extraction workflow and the retrieval agent

pub mod cancel;
pub mod client;
pub mod error;
pub mod model;
pub mod trail;
pub mod usage;
