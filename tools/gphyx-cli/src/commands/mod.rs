pub mod check;
pub mod frames;
pub mod info;
pub mod render;
pub mod track;
