mod table;

pub use table::TableScreen;
