pub mod commands;
pub mod conversation;
pub mod render;
pub mod repl;
