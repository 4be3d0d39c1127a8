mod commands_tests;
mod models_tests;
