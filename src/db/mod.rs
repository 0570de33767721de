//! MongoDB access for video metadata

pub mod mongo;
pub mod schemas;

pub use mongo::MongoClient;
