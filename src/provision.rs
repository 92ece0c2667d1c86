use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use zip::ZipArchive;

const DOWNLOAD_TIMEOUT_SECONDS: u64 = 600;

/// Download a prebuilt vector-store archive and unpack it into `dest`.
///
/// This is an explicit provisioning step; serving never downloads
/// anything on its own. An already-populated destination is left alone.
#[inline]
pub fn fetch_store(url: &str, dest: &Path) -> Result<()> {
    if store_present(dest) {
        info!("Vector store already present at {}", dest.display());
        println!(
            "Vector store already exists at {}; delete it to re-fetch.",
            dest.display()
        );
        return Ok(());
    }

    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create store directory: {}", dest.display()))?;

    let archive_path = dest.with_extension("zip.partial");
    info!("Downloading vector store archive from {}", url);
    println!("Downloading vector store archive...");

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(DOWNLOAD_TIMEOUT_SECONDS)))
        .build()
        .into();

    let mut response = agent
        .get(url)
        .call()
        .with_context(|| format!("Failed to download archive from {}", url))?;

    {
        let mut file = File::create(&archive_path).with_context(|| {
            format!("Failed to create archive file: {}", archive_path.display())
        })?;
        let mut reader = response.body_mut().as_reader();
        io::copy(&mut reader, &mut file).context("Failed to write archive to disk")?;
    }

    info!("Unpacking archive into {}", dest.display());
    println!("Unpacking archive...");

    let archive_file = File::open(&archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(archive_file).context("Failed to read zip archive")?;
    archive
        .extract(dest)
        .with_context(|| format!("Failed to unpack archive into {}", dest.display()))?;

    if let Err(e) = fs::remove_file(&archive_path) {
        warn!("Failed to remove downloaded archive: {}", e);
    }

    println!("Vector store provisioned at {}", dest.display());
    Ok(())
}

fn store_present(dest: &Path) -> bool {
    fs::read_dir(dest)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
