mod client;

pub use client::RepositoryClient;
