//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one area of the
//! ecosystem core against the mock ports in `mock_hw`.  Time is paused, so
//! cadences and countdowns advance deterministically.

mod climate_tests;
mod ecosystem_tests;
mod light_tests;
