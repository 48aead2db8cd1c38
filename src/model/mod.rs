pub mod client_message;
pub mod game;
pub mod server_message;
