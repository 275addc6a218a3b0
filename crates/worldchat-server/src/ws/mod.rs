//! WebSocket endpoints

pub mod world_groups;
