//! Test suites for the intake daemon bootstrap.

pub(crate) mod support;
