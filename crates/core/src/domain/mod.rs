pub mod company;
pub mod event;
