pub mod machine;
pub mod order;
pub mod upload;
pub mod view;
