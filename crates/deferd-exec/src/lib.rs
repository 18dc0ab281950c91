mod error;
pub use error::{ExecError, ExecResult};

#[cfg(feature = "shell")]
mod util;

#[cfg(feature = "shell")]
pub mod shell;
#[cfg(feature = "shell")]
pub use shell::ShellRunner;

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    #[cfg(feature = "shell")]
    pub use crate::shell::ShellRunner;
}
