//! Test suites for the courier daemon.

mod http_behaviour;
mod support;
