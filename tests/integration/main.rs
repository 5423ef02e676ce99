//! Integration tests for imagemill

mod cli_tests;
mod fetch_tests;
mod pipeline_tests;
