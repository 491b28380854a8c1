mod extract_tests;
mod scheduler_tests;
