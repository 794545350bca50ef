//! CLI subcommand implementations

pub mod init_config;
pub mod replay;
