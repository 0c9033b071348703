pub mod answers;
pub mod price_table;
