//! Privilege checks shared by the tubeharvest binaries.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when a binary is started as root. Harvest trees are meant to be
/// owned by the user who runs the pipeline; a root-owned tree breaks every
/// later re-run as a regular user.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!("{process} refuses to run as root; rerun as the user who owns the harvest tree");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Uid;

    #[test]
    fn regular_users_pass() {
        assert!(ensure_not_root_for(Uid::from_raw(1000), "harvest_videos").is_ok());
    }

    #[test]
    fn root_is_rejected() {
        let err = ensure_not_root_for(Uid::from_raw(0), "harvest_videos").unwrap_err();
        assert!(err.to_string().contains("refuses to run as root"));
    }
}
