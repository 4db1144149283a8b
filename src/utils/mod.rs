pub mod logging;
pub mod time;

pub use logging::truncate_text;
