//! Manifest file I/O

use std::path::Path;

use airdrop_types::DistributionManifest;

use crate::Result;

/// Write a manifest so readers never observe a partial file
pub fn write_manifest(path: &Path, manifest: &DistributionManifest) -> Result<()> {
    let json = manifest.to_json()?;

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<DistributionManifest> {
    let json = std::fs::read_to_string(path)?;
    Ok(DistributionManifest::from_json(&json)?)
}
