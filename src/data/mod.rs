//! Data layer for the grid
//!
//! Rows as fetched from the data source, plus the pure engines that turn
//! them into a filtered, sorted and paged view.

pub mod data_view;
pub mod datavalue_compare;
pub mod filter;
pub mod pagination;
pub mod row;
pub mod sort;
