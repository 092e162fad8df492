// @file: chart_gateway/src/tests/mod.rs
// @description: Unit and router-level test suites.
// @author: LAS.


pub mod http_api_tests;
