pub mod init;
pub mod matrix;
pub mod tensor;
