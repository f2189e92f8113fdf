//! Test suite modules

mod bridge;
mod deferred;
mod driver;
mod gather;
mod hooks;
