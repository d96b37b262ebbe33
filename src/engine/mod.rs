pub mod price;
pub mod task;
