#![allow(dead_code)]

pub mod strategies;

use command_response_manager::{
    CommandId, CommandIdGenerator, CommandResponseConfig, CommandResponseManager,
    UuidCommandIdGenerator,
};

pub fn new_id() -> CommandId {
    UuidCommandIdGenerator.next_id()
}

pub fn new_ids<const N: usize>() -> [CommandId; N] {
    std::array::from_fn(|_| new_id())
}

pub fn manager() -> CommandResponseManager {
    CommandResponseManager::default()
}

pub fn manager_with_buffer(capacity: usize) -> CommandResponseManager {
    CommandResponseManager::new(CommandResponseConfig {
        subscription_buffer_capacity: capacity,
        ..Default::default()
    })
    .expect("valid test configuration")
}
