pub mod chrome;
pub mod page;

pub use chrome::{ChromeDriver, ConnectionMode};
pub use page::ChromePage;
