//! Command implementations.

pub mod ask;
pub mod chats;
pub mod config;
pub mod show;

pub use self::ask::execute_ask;
pub use self::chats::execute_chats;
pub use self::config::execute_config;
pub use self::show::execute_show;
