pub mod artifact;
pub mod data;
pub mod encode;
pub mod features;
pub mod forest;
pub mod predict;
pub mod train;
