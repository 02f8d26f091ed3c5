pub mod batch;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod validate;

pub use error::{ConversionError, ParseError};
pub use pipeline::{convert, convert_raw_to_nmax, convert_raw_to_obvs, ConversionResult};
pub use process::export::data_to_csv;
pub use process::filter::ConversionOptions;
pub use process::summary::{OutputFormat, SummaryTable};
pub use process::RawTable;
pub use validate::{validate_converted_data, validate_raw_data, ValidationResult};
