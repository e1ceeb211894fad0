//! Reader implementations

mod file;
mod html;

pub use file::FileReader;
pub use html::HtmlConverter;
