pub use broadcast_manager::BroadcastManager;

mod broadcast_manager;
mod broadcaster;
