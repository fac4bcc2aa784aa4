pub mod analysis;

pub use analysis::{AnalyzeRequest, Language, SendResultsRequest, UploadResponse};
