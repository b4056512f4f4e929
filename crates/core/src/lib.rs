#![deny(warnings)]

pub mod api;
pub mod chart;
pub mod config;
pub mod controller;
pub mod download;
pub mod render;
