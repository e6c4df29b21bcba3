pub mod fixtures;
pub mod logging;
pub mod server;

pub use fixtures::FakeBinary;
pub use logging::init_test_logging;
pub use server::TestServer;
