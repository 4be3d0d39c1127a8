mod models_tests;
