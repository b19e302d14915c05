pub mod cloudinary;
pub mod http_client;
pub mod validation;
