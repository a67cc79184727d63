//! Runtime adapters for BugBot (configuration, example data, logging, bug-site links).

pub mod bug_site;
pub mod config;
pub mod examples;
pub mod logging;
pub mod util;
