// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, operator access, security headers).

pub mod auth;
pub mod operator;
pub mod security;

pub use auth::require_auth;
pub use operator::require_operator;
