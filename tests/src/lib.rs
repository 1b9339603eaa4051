//! Cross-crate integration tests.
//!
//! Unit coverage lives in each crate's `#[cfg(test)]` modules; the tests
//! here exercise whole flows: session file in, diff/export/registry out.

#[cfg(test)]
mod diff_properties;
#[cfg(test)]
mod export;
#[cfg(test)]
mod session_e2e;
