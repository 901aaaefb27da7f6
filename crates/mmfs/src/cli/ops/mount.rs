use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};
use url::Url;

use client::chat::ChatClient;
use client::client::ApiClient;
use client::error::ApiError;
use mmfs::config::{ConfigError, FileConfig, MountConfig, Overrides, Password};
use mmfs::fs::{mount_options, FsError, MmFs, TreeBuilder};
use mmfs::logging::report_build_info;

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Directory to mount the filesystem on
    pub mount_point: PathBuf,

    /// Server URL, e.g. https://chat.example.com
    #[arg(long)]
    pub server: Option<Url>,

    #[arg(long, short)]
    pub username: Option<String>,

    #[arg(long, env = "MMFS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// PEM bundle of extra trusted CA certificates
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Let other users access the mount (needs user_allow_other in /etc/fuse.conf)
    #[arg(long)]
    pub allow_other: bool,

    /// Timeout for each request to the server
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Mount {
    fn overrides(&self) -> Overrides {
        Overrides {
            server: self.server.clone(),
            username: self.username.clone(),
            password: self.password.clone().map(Password::from),
            ca_cert: self.ca_cert.clone(),
            timeout_secs: self.timeout_secs,
            allow_other: self.allow_other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("login failed: {0}")]
    Login(#[from] ApiError),
    #[error("failed to list teams and channels: {0}")]
    Resolve(#[from] FsError),
    #[error("failed to mount {path:?}: {source}")]
    Mount {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mount {
    type Error = MountError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        report_build_info();

        let file = FileConfig::discover(ctx.config_path.as_deref())?;
        let config = MountConfig::resolve(self.mount_point.clone(), self.overrides(), file)?;

        let client = ApiClient::login(
            &config.client_config(),
            &config.username,
            config.password.expose(),
        )
        .await?;
        let client: Arc<dyn ChatClient> = Arc::new(client);

        let tree = TreeBuilder::new(client.clone()).resolve().await?;
        let fs = MmFs::new(Handle::current(), client, tree);

        let options = mount_options(config.allow_other);
        let session = fuser::spawn_mount2(fs, &config.mount_point, &options).map_err(|source| {
            MountError::Mount {
                path: config.mount_point.clone(),
                source,
            }
        })?;

        tracing::info!(
            mount_point = %config.mount_point.display(),
            server = %config.server,
            "mounted, waiting for SIGINT or SIGTERM"
        );

        let waited = wait_for_shutdown().await;

        // dropping the session unmounts and joins the FUSE thread
        tokio::task::block_in_place(move || drop(session));
        tracing::info!(mount_point = %config.mount_point.display(), "unmounted");

        waited.map_err(MountError::Signal)?;
        Ok(format!("unmounted {}", config.mount_point.display()))
    }
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            tracing::debug!("unmounting on SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::debug!("unmounting on SIGTERM");
        }
    }
    Ok(())
}
