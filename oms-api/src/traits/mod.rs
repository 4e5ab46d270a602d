pub mod collaborators;
pub mod repository;
