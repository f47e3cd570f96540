//! Process identity and liveness.

use super::RealRuntime;

impl RealRuntime {
    pub(crate) fn process_id_impl(&self) -> u32 {
        std::process::id()
    }

    #[cfg(unix)]
    #[tracing::instrument(skip(self))]
    pub(crate) fn is_process_alive_impl(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // 0 and negative values address process groups, never a single holder.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return false,
        };

        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    #[tracing::instrument(skip(self))]
    pub(crate) fn is_process_alive_impl(&self, pid: u32) -> bool {
        pid == std::process::id()
    }
}
