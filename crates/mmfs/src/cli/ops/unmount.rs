use std::path::PathBuf;

use clap::Args;
use tokio::process::Command;

#[derive(Args, Debug, Clone)]
pub struct Unmount {
    /// Mount point to detach
    pub mount_point: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum UnmountError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// The unmount helper for this platform and its arguments
fn unmount_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("umount", &[])
    } else {
        ("fusermount", &["-u"])
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Unmount {
    type Error = UnmountError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (program, args) = unmount_command();

        let output = Command::new(program)
            .args(args)
            .arg(&self.mount_point)
            .output()
            .await
            .map_err(|source| UnmountError::Spawn { program, source })?;

        if !output.status.success() {
            return Err(UnmountError::Failed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(mount_point = %self.mount_point.display(), "unmounted");
        Ok(format!("unmounted {}", self.mount_point.display()))
    }
}
