mod cancel;
mod download;
mod init;
mod list;
mod pause;
mod sweep;

pub use cancel::cmd_cancel;
pub use download::{DownloadArgs, cmd_download};
pub use init::cmd_init;
pub use list::cmd_list;
pub use pause::cmd_pause;
pub use sweep::cmd_sweep;
