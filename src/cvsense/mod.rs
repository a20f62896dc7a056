// SPDX-License-Identifier: MIT

pub mod config;
pub mod document;
pub mod factory;
pub mod mapper;
pub mod rag;
pub mod server;
pub mod store;
pub mod workflow;
