pub mod agent_repository;
pub mod consumer_repository;
pub mod conversation_repository;
pub mod message_repository;
pub mod task_spawner;
