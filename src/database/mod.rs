/*!
 * Database module for persistent storage of songs and songbooks.
 *
 * This module provides SQLite-based persistence for:
 * - Songs and their variants, with the translated fragment cache
 * - Songbooks, with their layout options and publish cache pointer
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
