pub mod chart;
pub mod controls;
pub mod datatable;
pub mod headers;
pub mod report;
pub mod text_input;
