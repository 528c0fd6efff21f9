pub mod check;
pub mod positions;
pub mod render;
