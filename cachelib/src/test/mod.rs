mod config_tests;
mod simulator_tests;
