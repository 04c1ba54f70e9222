//! CLI command implementations

/// Conditionally println based on silent mode
macro_rules! println_if {
    ($silent:expr) => {
        if !$silent {
            println!();
        }
    };
    ($silent:expr, $($arg:tt)*) => {
        if !$silent {
            println!($($arg)*);
        }
    };
}

pub mod card_init;
pub mod config;
pub mod factory;
pub mod format;
pub mod plan;
pub mod tag;
pub mod write;
pub mod write_block;
