// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable storage keys. Changing these orphans previously persisted sessions.

pub const AUTH_TOKEN: &str = "@wellvantage/auth_token";
pub const REFRESH_TOKEN: &str = "@wellvantage/refresh_token";
pub const USER_DATA: &str = "@wellvantage/user_data";
