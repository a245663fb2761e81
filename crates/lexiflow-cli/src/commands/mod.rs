pub mod check;
pub mod due;
pub mod init;
pub mod study;
