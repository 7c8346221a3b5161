mod feed_tests;
mod utils;
