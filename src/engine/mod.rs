pub mod alert;
pub mod binding;
pub mod coordinator;
pub mod duty;
pub mod reporter;
