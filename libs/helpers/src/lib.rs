pub mod chooser;
pub mod documents;
pub mod index;
pub mod store;
