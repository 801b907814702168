pub mod damas_service_errors;
pub mod wallet_errors;
