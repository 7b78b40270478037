//! Unit tests for the Hetzner lifecycle manager.
