pub mod admin;
pub mod chat;
pub mod shared;

pub use admin::AdminSidebar;
pub use chat::ChatView;
