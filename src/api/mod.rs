pub mod fade;
pub mod models;
