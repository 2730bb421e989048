//! CLI module for the gchat launcher

pub mod mcp;
