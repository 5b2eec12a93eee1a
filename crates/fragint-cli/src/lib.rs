pub mod config;
pub mod mgf;
pub mod output;
pub mod peprec;
pub mod predict;
