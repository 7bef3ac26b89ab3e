pub mod precomputed_embedding_provider;
