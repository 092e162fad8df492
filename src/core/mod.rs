// @file: chart_gateway/src/core/mod.rs
// @description: Exports chart domain logic and data structures.
// @author: LAS.

pub mod chart_service;
pub mod error;
pub mod interfaces;
pub mod models;
pub mod normalizer;
pub mod rate_limit;
