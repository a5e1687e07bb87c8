pub mod prelude;

pub mod download_record;
