pub mod constants;
pub mod detection;
pub mod frame;
pub mod source_info;
