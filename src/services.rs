pub mod authority;
pub mod feedback;
pub mod game_service;
pub mod room_service;
pub mod role_service;
pub mod sync_service;
pub mod turn_service;
pub mod vote_service;
pub mod word_pack_registry;
