mod http_tests;
mod parse_tests;
mod stream_tests;
