mod helpers;

mod format_tests;
mod mount_tests;
