//! Configuration management for foldr.
//!
//! Engine preferences ([`settings::Config`]) are stored as a TOML file and
//! loaded at startup by the front-end.

pub mod settings;
