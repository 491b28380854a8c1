pub mod page;
pub mod relay;
pub mod replay;
