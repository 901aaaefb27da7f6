use std::fmt;

/// Build metadata captured by the build script
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub repo_version: &'static str,
    pub build_profile: &'static str,
    pub build_timestamp: &'static str,
    pub build_target: Option<&'static str>,
    pub build_features: Vec<&'static str>,
}

impl BuildInfo {
    pub fn new() -> Self {
        let mut build_features = Vec::new();
        if cfg!(debug_assertions) {
            build_features.push("debug-assertions");
        }

        Self {
            version: env!("CARGO_PKG_VERSION"),
            repo_version: env!("REPO_VERSION"),
            build_profile: env!("BUILD_PROFILE"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_target: option_env!("BUILD_TARGET"),
            build_features,
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mmfs {} ({}, {} build",
            self.version, self.repo_version, self.build_profile
        )?;
        if let Some(target) = self.build_target {
            write!(f, " for {}", target)?;
        }
        write!(f, ", built {})", self.build_timestamp)
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::new()
}
