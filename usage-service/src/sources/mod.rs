pub mod reading_csv_file;
pub mod synthetic;

pub use reading_csv_file::ReadingCsvFileSource;
pub use synthetic::SyntheticReadingSource;
