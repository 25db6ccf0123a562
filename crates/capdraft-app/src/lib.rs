// Library root: feeds, persistence, the draft session task and the command
// front end, exposed for the binary and integration tests.

pub mod commands;
pub mod db;
pub mod feed;
pub mod protocol;
pub mod session;
