// Shared library untuk semua Serbisyo services

pub mod models;
pub mod utils;
