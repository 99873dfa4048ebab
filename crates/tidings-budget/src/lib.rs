// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget enforcement for AI-assisted operations in Tidings.
//!
//! This crate provides:
//! - **Budget governor**: Daily admission checks with hard cost and call
//!   caps, backed by the `budget_daily` table
//! - **Sticky degradation**: Cap crossings disable the operation for the
//!   remainder of the UTC day
//! - **Pricing**: Per-operation price table and call-size estimates

pub mod governor;
pub mod pricing;

pub use governor::{BudgetGovernor, PinnedBudget, QuotaDecision, QuotaGate};
