pub mod assistant;
pub mod chat;
pub mod coach;
pub mod csv_loader;
pub mod llm_bridge;
pub mod risk;
pub mod sentiment;
