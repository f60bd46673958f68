mod input_loader;
mod output_writer;
mod validators;

pub use input_loader::{load_responses, unescape_separator};
pub use output_writer::write_report;
pub use validators::{validate_file_exists, validate_positive, validate_temperature};
