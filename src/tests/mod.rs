// Test modules for Retro Forward
// Shared fixtures live in mock_router; each *_tests module covers one area of the crate

mod config_tests;
mod network_tests;
mod rules_tests;
