//! Text processing used by the pipeline's structural assembly stage.

pub mod markup;
pub mod quality;
pub mod stopwords;
pub mod token_reduction;

pub use markup::{extract_pipe_tables, split_elements, strip_markdown};
pub use quality::calculate_quality_score;
pub use token_reduction::{ReductionStats, get_reduction_statistics, reduce_tokens};
