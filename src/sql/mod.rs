// ABOUTME: SQL safety validation: single-statement, read-only, deny-list enforcement
// ABOUTME: Runs before every query a tool action hands to a backend
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # SQL Validator
//!
//! Every query an MCP action executes passes through [`validator::validate`]
//! first. The check is deliberately conservative: it only allows a single
//! `SELECT` (or a `PRAGMA table_info(...)` introspection call, or a
//! `DESCRIBE`/`SHOW` statement on backends that support them) and rejects
//! anything containing a dangerous keyword, a known injection pattern, or a
//! suspicious identifier — the same three-layer check the original Python
//! tool performed with `sqlparse`.

pub mod validator;

pub use validator::{validate, RejectionReason, StatementKind};
