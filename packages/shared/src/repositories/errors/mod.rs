pub mod history_repository_errors;
pub mod repository_errors;
pub mod store_errors;
