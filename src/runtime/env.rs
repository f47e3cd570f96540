//! Environment and system information operations.

use std::env;
use std::path::PathBuf;
use std::time::SystemTime;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn cache_dir_impl(&self) -> Option<PathBuf> {
        dirs::cache_dir()
    }

    pub(crate) fn now_impl(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_real_runtime_env_and_dirs() {
        let runtime = RealRuntime;

        // PATH should exist on all systems
        assert!(runtime.env_var("PATH").is_ok());
        assert!(runtime.env_var("NIXUP_SURELY_UNSET_VARIABLE").is_err());

        // CI might not have a cache dir
        let cache = runtime.cache_dir();
        assert!(cache.is_some() || cfg!(target_os = "linux"));

        assert!(runtime.now() > UNIX_EPOCH);
    }
}
