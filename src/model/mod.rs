pub mod converter;
pub mod data_core;
pub mod editor;
pub mod node;
pub mod search;
pub mod tree_store;
pub mod tree_view;
