//! Command implementations

pub mod append;
pub mod backup;
pub mod cat;
pub mod create;
pub mod delete;
pub mod move_cmd;
pub mod props;
pub mod watch;
