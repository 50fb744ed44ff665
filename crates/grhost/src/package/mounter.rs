use async_trait::async_trait;
use grhost_core::HostError;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Opaque token identifying an attached disk image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle(pub String);

/// Attaches runtime package images to directories
#[async_trait]
pub trait ImageMounter: Send + Sync {
    /// Attach `image` read-only at `target`, which already exists and is empty
    async fn attach(&self, image: &Path, target: &Path) -> Result<MountHandle, HostError>;

    async fn detach(&self, handle: &MountHandle, target: &Path) -> Result<(), HostError>;
}

/// Mounts images with the operating system's own tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemImageMounter;

async fn run(program: &str, args: &[&str]) -> Result<(), HostError> {
    debug!(program, ?args, "Running mount tool");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| HostError::package_error(format!("failed to run {program}: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(HostError::package_error(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(unix)]
#[async_trait]
impl ImageMounter for SystemImageMounter {
    async fn attach(&self, image: &Path, target: &Path) -> Result<MountHandle, HostError> {
        let image = image.to_string_lossy();
        let target_str = target.to_string_lossy();
        run("mount", &["-o", "loop,ro", &image, &target_str]).await?;
        Ok(MountHandle(target_str.into_owned()))
    }

    async fn detach(&self, handle: &MountHandle, _target: &Path) -> Result<(), HostError> {
        run("umount", &[&handle.0]).await
    }
}

#[cfg(windows)]
#[async_trait]
impl ImageMounter for SystemImageMounter {
    async fn attach(&self, image: &Path, target: &Path) -> Result<MountHandle, HostError> {
        let image = image.to_string_lossy().replace('\'', "''");
        let target = target.to_string_lossy().replace('\'', "''");
        let script = format!(
            "Mount-DiskImage -ImagePath '{image}' -NoDriveLetter -PassThru | Get-Disk | Get-Partition \
             | Add-PartitionAccessPath -AccessPath '{target}'"
        );
        run("powershell", &["-NoProfile", "-NonInteractive", "-Command", &script]).await?;
        Ok(MountHandle(image))
    }

    async fn detach(&self, handle: &MountHandle, _target: &Path) -> Result<(), HostError> {
        let script = format!("Dismount-DiskImage -ImagePath '{}'", handle.0);
        run("powershell", &["-NoProfile", "-NonInteractive", "-Command", &script]).await
    }
}
