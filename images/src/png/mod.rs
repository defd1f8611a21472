pub mod algorythms;
pub mod base;
