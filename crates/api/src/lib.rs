// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the Wellvantage trainer API.
//!
//! [`client::ApiClient`] attaches the bearer token to every call and
//! recovers from an expired access token with a single refresh exchange
//! shared by all concurrent requests. [`session::SessionController`] keeps
//! the signed-in user, persisted tokens, and the client in step.

pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod services;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
pub mod test_support;
