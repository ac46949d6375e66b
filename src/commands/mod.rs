//! CLI command handlers.

mod generate;
mod list;

pub(crate) use generate::run_generate_command;
pub(crate) use list::run_list_command;
