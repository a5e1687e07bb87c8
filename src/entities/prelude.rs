pub use super::download_record::Entity as DownloadRecords;
