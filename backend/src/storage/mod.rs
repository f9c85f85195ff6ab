pub mod classification_store;
