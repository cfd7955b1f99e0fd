//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against
//! the mock adapters in `mock_hw`.  All tests run on the host with no
//! real hardware required.

mod scheduler_tests;
mod service_tests;
