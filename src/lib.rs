pub mod db;
pub mod error;
pub mod ipc;
pub mod weights;
