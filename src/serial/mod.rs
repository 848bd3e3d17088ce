pub mod connection;
pub mod parser;
pub mod reader;

pub use reader::ScaleReader;
