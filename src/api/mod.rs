// @file: chart_gateway/src/api/mod.rs
// @description: HTTP surface of the gateway.
// @author: LAS.

pub mod http_server;
