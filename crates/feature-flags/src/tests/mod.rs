//! Cross-module evaluation properties.

mod scenarios;
