pub mod payment_handler;
pub mod paymongo_service;
pub mod reconciliation_handler;
pub mod refund_handler;
pub mod webhook_handler;
