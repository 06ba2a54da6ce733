pub mod indigo;
