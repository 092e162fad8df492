// @file: chart_gateway\src\lib.rs
// @description: Exposes the modular architecture for integration testing and external usage.
// @author: LAS.


pub mod api;
pub mod core;
pub mod connectors;
pub mod tests;
pub mod utils;
