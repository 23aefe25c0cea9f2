mod repository;
mod schema;
mod translations;

pub use repository::Repository;
