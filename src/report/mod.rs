mod recommendations;
mod render;

pub use recommendations::{format_bytes, recommendations};
pub use render::{render_markdown, render_text, save_report, to_json, ReportFormat};
