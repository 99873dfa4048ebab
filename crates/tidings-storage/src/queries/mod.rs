// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod budget;
pub mod decisions;
pub mod ledger;
pub mod matches;
pub mod runs;
