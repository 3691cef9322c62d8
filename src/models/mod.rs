pub mod coach;
pub mod table;
