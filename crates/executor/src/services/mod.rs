pub mod execution_service;
pub mod telegram_service;
