//! Terminal output for the status and flush commands

mod status;

pub use status::{print_flush_confirmation, print_status};
