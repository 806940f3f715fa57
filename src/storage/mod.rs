//! Storage access: allow-list validation and object reads.

pub mod path;
pub mod store;

pub use path::{PathValidator, RemoteDataReference};
pub use store::{FetchedObject, HttpObjectStore, LocalObjectStore, ObjectStore, StoreError};
