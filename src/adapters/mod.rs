// Adapters layer: concrete implementations of the domain ports (filesystem, process control, certbot)

pub mod certbot;
pub mod file_ops;
pub mod process;
pub mod storage;

pub use certbot::{CertbotClient, CertbotSettings};
pub use file_ops::{LocalFileOps, SudoFileOps};
pub use process::{ServiceController, TokioCommandRunner};
pub use storage::LocalStorage;
