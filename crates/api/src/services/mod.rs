// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed wrappers over the backend's REST endpoints.
//!
//! Each function issues exactly one call through [`crate::client::ApiClient`]
//! and unwraps the `{ success, data }` envelope. Wire fields are camelCase.

pub mod auth;
pub mod availability;
pub mod clients;
pub mod workout;

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
