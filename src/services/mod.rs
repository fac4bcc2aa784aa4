pub mod image_fetcher;
pub mod invoker;
pub mod media_host;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod reconcile;
pub mod recovery;

pub use image_fetcher::ImageFetcher;
pub use invoker::ModelPair;
pub use media_host::{CloudinaryClient, MediaHost, MockMediaHost};
pub use pipeline::RouteSpec;
