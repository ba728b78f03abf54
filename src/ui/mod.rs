pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, muted, post_line, reply_line, section, success, summary_row, warn};
pub use table::{stats_table, TableBuilder};
pub use theme::{theme, Theme};
